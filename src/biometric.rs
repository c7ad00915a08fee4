//! Placeholder biometric comparator.
//!
//! THIS IS NOT A FACE MATCHER. It hashes both files with SHA-256 and measures
//! how many leading hex characters of the digests agree. Two different photos
//! of the same person will score near zero; only byte-identical files score 1.
//! It exists so the onboarding flow has a match score to feed the risk model.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Label reported alongside every score produced by this module.
pub const MATCH_METHOD: &str = "file_hash_prefix_placeholder";

/// Human-readable disclaimer returned to clients.
pub const MATCH_NOTE: &str =
    "placeholder score from file-hash prefix comparison; not a biometric or liveness check";

/// Computes the SHA-256 digest of a byte slice, hex encoded.
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Length of the common leading run of two digests, normalized by the longer one.
///
/// Symmetric by construction. Returns 0 when both are empty.
pub fn hash_prefix_similarity(a: &str, b: &str) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }

    let common = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();

    (common as f64 / longest as f64).min(1.0)
}

/// Compares two stored files. Missing or unreadable files score 0.
pub async fn file_hash_similarity(first: &Path, second: &Path) -> f64 {
    let (a, b) = match tokio::try_join!(tokio::fs::read(first), tokio::fs::read(second)) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(
                "Match heuristic could not read {} / {}: {}",
                first.display(),
                second.display(),
                e
            );
            return 0.0;
        }
    };

    hash_prefix_similarity(&compute_checksum(&a), &compute_checksum(&b))
}

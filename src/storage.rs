//! Local disk storage for uploaded files.

use crate::errors::{AppError, ResultExt};
use chrono::Utc;
use std::path::{Path, PathBuf};

const FALLBACK_NAME: &str = "upload.bin";

/// Creates the directory (and parents) if missing.
pub async fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create storage directory {}", dir.display()))
}

/// Writes an upload to `dir` as `<timestamp>__<name>` and returns its path.
pub async fn save_upload(
    bytes: &[u8],
    original_name: &str,
    dir: &Path,
) -> Result<PathBuf, AppError> {
    ensure_dir(dir).await?;

    let path = dir.join(stored_file_name(original_name));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write upload {}", path.display()))?;

    tracing::info!("Stored upload {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

/// Builds the on-disk name: an ISO timestamp stripped of `:` and `.`, two
/// underscores, then the sanitized client file name.
pub fn stored_file_name(original_name: &str) -> String {
    let ts = Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "");
    format!("{}__{}", ts, sanitize_file_name(original_name))
}

/// Keeps only the final path component of a client-supplied name.
pub fn sanitize_file_name(original_name: &str) -> String {
    let last = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Final path component as a string, used when building public URLs.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\id.png"), "id.png");
        assert_eq!(sanitize_file_name("passport.jpg"), "passport.jpg");
    }

    #[test]
    fn test_sanitize_empty_names() {
        assert_eq!(sanitize_file_name(""), FALLBACK_NAME);
        assert_eq!(sanitize_file_name("dir/"), FALLBACK_NAME);
        assert_eq!(sanitize_file_name(".."), FALLBACK_NAME);
    }

    #[test]
    fn test_stored_name_has_no_colons_or_dots_in_timestamp() {
        let name = stored_file_name("id.png");
        let (ts, rest) = name.split_once("__").unwrap();
        assert_eq!(rest, "id.png");
        assert!(!ts.contains(':'));
        assert!(!ts.contains('.'));
        assert!(ts.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_save_upload_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");

        let path = save_upload(b"hello", "doc.png", &target).await.unwrap();

        assert!(path.starts_with(&target));
        assert!(file_name_of(&path).ends_with("__doc.png"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
    }
}

//! Rule-based risk scoring.
//!
//! A deterministic linear formula over the document confidence and the match
//! score, with a fixed penalty for suspicious activity.

use crate::config::RiskWeights;
use crate::models::{RiskAssessment, RiskLevel};

/// Scores a session with the default weights.
pub fn compute_risk_score(
    document_confidence: f64,
    match_score: f64,
    suspicious: bool,
) -> RiskAssessment {
    compute_risk_score_with(&RiskWeights::default(), document_confidence, match_score, suspicious)
}

/// Scores a session.
///
/// `score = clamp(1 - (doc_weight * doc + match_weight * match), 0, 1)`, plus
/// `suspicious_penalty` when `suspicious` is set, clamped again to [0, 1].
/// Inputs are clamped to [0, 1] first. A negative penalty counts as zero, so a
/// flagged session never scores below an unflagged one.
pub fn compute_risk_score_with(
    weights: &RiskWeights,
    document_confidence: f64,
    match_score: f64,
    suspicious: bool,
) -> RiskAssessment {
    let doc = clamp_unit(document_confidence);
    let matched = clamp_unit(match_score);

    let mut score = clamp_unit(1.0 - (doc * weights.doc_weight + matched * weights.match_weight));
    if suspicious {
        score = clamp_unit(score + weights.suspicious_penalty.max(0.0));
    }

    RiskAssessment {
        score,
        level: classify(weights, score),
        explanation: format!(
            "Computed from doc_confidence={:.2}, match_score={:.2}, suspicious_event={}",
            doc, matched, suspicious
        ),
    }
}

/// Maps a score onto LOW / MEDIUM / HIGH. Thresholds are exclusive upper bounds.
pub fn classify(weights: &RiskWeights, score: f64) -> RiskLevel {
    if score < weights.low_threshold {
        RiskLevel::Low
    } else if score < weights.high_threshold {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        let w = RiskWeights::default();
        assert_eq!(classify(&w, 0.0), RiskLevel::Low);
        assert_eq!(classify(&w, 0.2999), RiskLevel::Low);
        assert_eq!(classify(&w, 0.3), RiskLevel::Medium);
        assert_eq!(classify(&w, 0.6999), RiskLevel::Medium);
        assert_eq!(classify(&w, 0.7), RiskLevel::High);
        assert_eq!(classify(&w, 1.0), RiskLevel::High);
    }

    #[test]
    fn test_no_evidence_is_high_risk() {
        let r = compute_risk_score(0.0, 0.0, false);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.level, RiskLevel::High);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let r = compute_risk_score(5.0, -3.0, false);
        assert!((r.score - 0.4).abs() < 1e-9);
        assert!(r.explanation.contains("doc_confidence=1.00"));
        assert!(r.explanation.contains("match_score=0.00"));

        let nan = compute_risk_score(f64::NAN, f64::NAN, false);
        assert_eq!(nan.score, 1.0);
    }

    #[test]
    fn test_negative_penalty_never_lowers_score() {
        let w = RiskWeights {
            suspicious_penalty: -0.5,
            ..RiskWeights::default()
        };

        let flagged = compute_risk_score_with(&w, 0.9, 0.8, true);
        let clean = compute_risk_score_with(&w, 0.9, 0.8, false);
        assert!((0.0..=1.0).contains(&flagged.score));
        assert!(flagged.score >= clean.score);
        assert_eq!(flagged.level, RiskLevel::Low);
    }

    #[test]
    fn test_large_penalty_caps_at_one() {
        let w = RiskWeights {
            suspicious_penalty: 3.0,
            ..RiskWeights::default()
        };
        let r = compute_risk_score_with(&w, 1.0, 1.0, true);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.level, RiskLevel::High);
    }

    #[test]
    fn test_explanation_echoes_inputs() {
        let r = compute_risk_score(0.9, 0.8, true);
        assert_eq!(
            r.explanation,
            "Computed from doc_confidence=0.90, match_score=0.80, suspicious_event=true"
        );
    }
}

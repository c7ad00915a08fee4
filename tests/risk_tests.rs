/// Unit tests for risk scoring and confidence blending
/// Covers the worked examples and threshold partitioning
use kyc_gateway::config::{ConfidenceTuning, RiskWeights};
use kyc_gateway::core::risk::{classify, compute_risk_score, compute_risk_score_with};
use kyc_gateway::models::RiskLevel;
use kyc_gateway::pipeline::blend_confidence;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[cfg(test)]
mod worked_examples {
    use super::*;

    #[test]
    fn test_confident_document_and_match_is_low() {
        let r = compute_risk_score(0.9, 0.8, false);
        assert!(approx(r.score, 0.14));
        assert_eq!(r.level, RiskLevel::Low);
    }

    #[test]
    fn test_suspicious_flag_adds_penalty() {
        let r = compute_risk_score(0.9, 0.8, true);
        assert!(approx(r.score, 0.54));
        assert_eq!(r.level, RiskLevel::Medium);
    }

    #[test]
    fn test_suspicious_saturates_at_one() {
        let r = compute_risk_score(0.0, 0.0, true);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.level, RiskLevel::High);
    }

    #[test]
    fn test_blend_of_strong_stages() {
        let c = blend_confidence(0.98, 0.99, &ConfidenceTuning::default());
        assert!(approx(c, 0.984));
    }
}

#[cfg(test)]
mod thresholds {
    use super::*;

    #[test]
    fn test_partition_at_exact_thresholds() {
        let w = RiskWeights::default();
        assert_eq!(classify(&w, 0.3), RiskLevel::Medium);
        assert_eq!(classify(&w, 0.7), RiskLevel::High);
        assert_eq!(classify(&w, 0.29999999), RiskLevel::Low);
        assert_eq!(classify(&w, 0.69999999), RiskLevel::Medium);
    }

    #[test]
    fn test_custom_weights() {
        let w = RiskWeights {
            doc_weight: 1.0,
            match_weight: 0.0,
            suspicious_penalty: 0.1,
            low_threshold: 0.5,
            high_threshold: 0.9,
            match_threshold: 0.75,
        };

        let r = compute_risk_score_with(&w, 0.5, 1.0, true);
        assert!(approx(r.score, 0.6));
        assert_eq!(r.level, RiskLevel::Medium);
    }
}

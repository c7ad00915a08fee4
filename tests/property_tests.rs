/// Property-based tests using proptest
/// Tests invariants of the scoring functions that should hold for all inputs
use kyc_gateway::biometric::hash_prefix_similarity;
use kyc_gateway::config::{ConfidenceTuning, RiskWeights};
use kyc_gateway::models::RiskLevel;
use kyc_gateway::ocr::ocr_confidence;
use kyc_gateway::pipeline::blend_confidence;
use kyc_gateway::risk::compute_risk_score;
use proptest::prelude::*;

// Property: risk score is bounded and monotone
proptest! {
    #[test]
    fn risk_score_stays_in_unit_interval(
        doc in -2.0f64..3.0,
        matched in -2.0f64..3.0,
        suspicious in proptest::bool::ANY
    ) {
        let r = compute_risk_score(doc, matched, suspicious);
        prop_assert!((0.0..=1.0).contains(&r.score));
    }

    #[test]
    fn risk_non_increasing_in_doc_confidence(
        doc in 0.0f64..=1.0,
        delta in 0.0f64..=1.0,
        matched in 0.0f64..=1.0,
        suspicious in proptest::bool::ANY
    ) {
        let lower = compute_risk_score(doc, matched, suspicious);
        let higher = compute_risk_score((doc + delta).min(1.0), matched, suspicious);
        prop_assert!(higher.score <= lower.score);
    }

    #[test]
    fn risk_non_increasing_in_match_score(
        doc in 0.0f64..=1.0,
        matched in 0.0f64..=1.0,
        delta in 0.0f64..=1.0,
        suspicious in proptest::bool::ANY
    ) {
        let lower = compute_risk_score(doc, matched, suspicious);
        let higher = compute_risk_score(doc, (matched + delta).min(1.0), suspicious);
        prop_assert!(higher.score <= lower.score);
    }

    #[test]
    fn suspicious_flag_raises_or_saturates(doc in 0.0f64..=1.0, matched in 0.0f64..=1.0) {
        let calm = compute_risk_score(doc, matched, false);
        let flagged = compute_risk_score(doc, matched, true);
        prop_assert!(flagged.score > calm.score || flagged.score == 1.0);
    }

    #[test]
    fn level_matches_thresholds(doc in 0.0f64..=1.0, matched in 0.0f64..=1.0, suspicious in proptest::bool::ANY) {
        let w = RiskWeights::default();
        let r = compute_risk_score(doc, matched, suspicious);
        let expected = if r.score < w.low_threshold {
            RiskLevel::Low
        } else if r.score < w.high_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        };
        prop_assert_eq!(r.level, expected);
    }
}

// Property: confidences are bounded
proptest! {
    #[test]
    fn blended_confidence_is_clamped(ocr in -1.0f64..2.0, llm in -1.0f64..2.0) {
        let t = ConfidenceTuning::default();
        let c = blend_confidence(ocr, llm, &t);
        prop_assert!(c >= t.blend_min && c <= t.blend_max);
    }

    #[test]
    fn ocr_confidence_is_clamped(blocks in proptest::collection::vec(proptest::option::of(0.0f64..=100.0), 0..20)) {
        let t = ConfidenceTuning::default();
        let c = ocr_confidence(&blocks, &t);
        prop_assert!(c >= t.ocr_min && c <= t.ocr_max);
    }
}

// Property: match heuristic is symmetric and bounded
proptest! {
    #[test]
    fn hash_similarity_is_symmetric(a in "[0-9a-f]{0,64}", b in "[0-9a-f]{0,64}") {
        prop_assert_eq!(hash_prefix_similarity(&a, &b), hash_prefix_similarity(&b, &a));
    }

    #[test]
    fn hash_similarity_in_unit_interval(a in "[0-9a-f]{0,64}", b in "[0-9a-f]{0,64}") {
        let s = hash_prefix_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn hash_similarity_of_self_is_one(a in "[0-9a-f]{1,64}") {
        prop_assert_eq!(hash_prefix_similarity(&a, &a), 1.0);
    }
}

//! Property tests for classification invariants

mod common;

use common::{orchestrator, ScriptedRanker};
use govstage_classifiers::RuleMatcher;
use govstage_core::{round_confidence, ClassificationRequest, StageId};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn rule_matching_is_deterministic(text in ".{0,200}") {
        let rules = RuleMatcher::default();
        prop_assert_eq!(rules.match_text(&text), rules.match_text(&text));
    }

    #[test]
    fn rule_matching_ignores_case(text in "[a-zA-Z0-9 -]{0,80}") {
        let rules = RuleMatcher::default();
        prop_assert_eq!(
            rules.match_text(&text.to_uppercase()),
            rules.match_text(&text.to_lowercase())
        );
    }

    #[test]
    fn results_stay_in_closed_range(
        text in ".{0,120}",
        top in prop::sample::select(StageId::ALL.to_vec()),
        score in 0.0f32..=1.0,
    ) {
        let orch = orchestrator(Arc::new(ScriptedRanker::new(top, score)), 4);
        let request = ClassificationRequest::new("p", text.clone());

        let rt = runtime();
        let first = rt.block_on(orch.classify_one(&request));
        let second = rt.block_on(orch.classify_one(&request));

        prop_assert!(StageId::ALL.contains(&first.stage));
        prop_assert!((0.0..=1.0).contains(&first.confidence));
        prop_assert_eq!(&first, &second);

        if text.trim().is_empty() {
            prop_assert_eq!(first.stage, StageId::Other);
            prop_assert_eq!(first.confidence, 0.0);
        }
    }

    #[test]
    fn rounding_keeps_four_decimals(confidence in any::<f32>()) {
        let rounded = round_confidence(confidence);
        prop_assert!((0.0..=1.0).contains(&rounded));
        prop_assert!(((rounded * 10_000.0).round() - rounded * 10_000.0).abs() < 1e-6);
    }
}

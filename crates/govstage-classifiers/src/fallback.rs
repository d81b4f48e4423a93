//! Fallback classifier adapter (second tier)
//!
//! Translates stages into candidate descriptions, asks the ranker for the
//! best one, and maps the winning description back to a stage. Every
//! failure is contained here and reported as [`FallbackOutcome::Degraded`].

use crate::ranker::{HypothesisTemplate, Ranker};
use futures::FutureExt;
use govstage_core::{StageDescriptions, StageId};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a fallback classification
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    /// The ranker's top description reconciled to a stage
    Ranked { stage: StageId, confidence: f32 },

    /// Ranking failed or could not be reconciled
    Degraded { reason: String },
}

impl FallbackOutcome {
    fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// Stage and confidence, with the `other` / 0.0 default for degraded outcomes
    pub fn stage_and_confidence(&self) -> (StageId, f32) {
        match self {
            Self::Ranked { stage, confidence } => (*stage, *confidence),
            Self::Degraded { .. } => (StageId::Other, 0.0),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Wraps a ranker with stage ↔ description reconciliation
pub struct FallbackClassifier {
    ranker: Arc<dyn Ranker>,
    descriptions: StageDescriptions,
    template: HypothesisTemplate,
    candidates: Vec<String>,
}

impl FallbackClassifier {
    /// Create a new fallback classifier
    pub fn new(
        ranker: Arc<dyn Ranker>,
        descriptions: StageDescriptions,
        template: HypothesisTemplate,
    ) -> Self {
        let candidates = descriptions.candidates();
        Self {
            ranker,
            descriptions,
            template,
            candidates,
        }
    }

    /// Classify text the rules could not resolve. Never fails.
    pub async fn classify(&self, text: &str) -> FallbackOutcome {
        let start = Instant::now();

        let ranked = AssertUnwindSafe(self.ranker.rank(text, &self.candidates, &self.template))
            .catch_unwind()
            .await;

        let predictions = match ranked {
            Ok(Ok(predictions)) => predictions,
            Ok(Err(e)) => {
                return FallbackOutcome::degraded(format!(
                    "ranker '{}' failed: {}",
                    self.ranker.name(),
                    e
                ))
            }
            Err(_) => {
                return FallbackOutcome::degraded(format!(
                    "ranker '{}' panicked",
                    self.ranker.name()
                ))
            }
        };

        let Some(top) = predictions.into_iter().next() else {
            return FallbackOutcome::degraded("ranker returned no predictions");
        };

        if !top.score.is_finite() || !(0.0..=1.0).contains(&top.score) {
            return FallbackOutcome::degraded(format!(
                "ranker returned out-of-range score {} for \"{}\"",
                top.score, top.label
            ));
        }

        match self.descriptions.stage_for(&top.label) {
            Some(stage) => {
                tracing::debug!(
                    "Fallback ranked '{}' ({:.4}) in {}us",
                    stage,
                    top.score,
                    start.elapsed().as_micros()
                );
                FallbackOutcome::Ranked {
                    stage,
                    confidence: top.score,
                }
            }
            None => FallbackOutcome::degraded(format!(
                "ranker returned unknown candidate \"{}\"",
                top.label
            )),
        }
    }

    /// Forward the chunk-boundary release hint to the ranker
    pub fn release(&self) {
        self.ranker.release();
    }

    pub fn ranker_name(&self) -> &str {
        self.ranker.name()
    }

    pub fn descriptions(&self) -> &StageDescriptions {
        &self.descriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::Prediction;
    use async_trait::async_trait;
    use govstage_core::{Error, Result};

    /// Returns a fixed ranking regardless of input
    struct FixedRanker(Vec<Prediction>);

    #[async_trait]
    impl Ranker for FixedRanker {
        async fn rank(
            &self,
            _text: &str,
            _candidates: &[String],
            _template: &HypothesisTemplate,
        ) -> Result<Vec<Prediction>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct ErrorRanker;

    #[async_trait]
    impl Ranker for ErrorRanker {
        async fn rank(
            &self,
            _text: &str,
            _candidates: &[String],
            _template: &HypothesisTemplate,
        ) -> Result<Vec<Prediction>> {
            Err(Error::ranking("model unavailable"))
        }

        fn name(&self) -> &str {
            "error"
        }
    }

    fn fallback(ranker: impl Ranker + 'static) -> FallbackClassifier {
        FallbackClassifier::new(
            Arc::new(ranker),
            StageDescriptions::default(),
            HypothesisTemplate::default(),
        )
    }

    #[tokio::test]
    async fn test_top_prediction_reconciled() {
        let classifier = fallback(FixedRanker(vec![
            Prediction::new(StageId::SvAnnounce.default_description(), 0.61),
            Prediction::new(StageId::Other.default_description(), 0.39),
        ]));

        let outcome = classifier.classify("hello").await;
        assert_eq!(
            outcome,
            FallbackOutcome::Ranked {
                stage: StageId::SvAnnounce,
                confidence: 0.61
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_label_degrades() {
        let classifier = fallback(FixedRanker(vec![Prediction::new("weather", 0.9)]));

        let outcome = classifier.classify("hello").await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.stage_and_confidence(), (StageId::Other, 0.0));
    }

    #[tokio::test]
    async fn test_ranker_error_degrades() {
        let outcome = fallback(ErrorRanker).classify("hello").await;
        match outcome {
            FallbackOutcome::Degraded { reason } => assert!(reason.contains("model unavailable")),
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_rankings_degrade() {
        let outcome = fallback(FixedRanker(Vec::new())).classify("hello").await;
        assert!(outcome.is_degraded());

        let outcome = fallback(FixedRanker(vec![Prediction::new(
            StageId::CipVote.default_description(),
            f32::NAN,
        )]))
        .classify("hello")
        .await;
        assert!(outcome.is_degraded());

        let outcome = fallback(FixedRanker(vec![Prediction::new(
            StageId::CipVote.default_description(),
            1.7,
        )]))
        .classify("hello")
        .await;
        assert!(outcome.is_degraded());
    }
}

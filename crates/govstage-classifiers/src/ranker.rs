//! Ranking capability trait and hypothesis framing

use async_trait::async_trait;
use govstage_core::{Error, Result};
use std::cmp::Ordering;

/// Placeholder substituted with each candidate description
pub const CANDIDATE_PLACEHOLDER: &str = "{candidate}";

/// Default hypothesis framing
pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This message is about {candidate}.";

/// One ranked candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Candidate description, exactly as submitted
    pub label: String,

    /// Score (0.0-1.0)
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Trait for zero-shot ranking backends.
///
/// Implementations score every candidate against the text and return the
/// candidates sorted by descending score (single-label: scores sum to 1).
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Rank candidate descriptions against the text
    async fn rank(
        &self,
        text: &str,
        candidates: &[String],
        template: &HypothesisTemplate,
    ) -> Result<Vec<Prediction>>;

    /// Get the ranker name
    fn name(&self) -> &str;

    /// Advisory hook to drop transient inference state between chunks
    fn release(&self) {}
}

/// Validated hypothesis template containing `{candidate}` exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypothesisTemplate(String);

impl HypothesisTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        match template.matches(CANDIDATE_PLACEHOLDER).count() {
            1 => Ok(Self(template)),
            0 => Err(Error::config(format!(
                "hypothesis template \"{}\" has no {} placeholder",
                template, CANDIDATE_PLACEHOLDER
            ))),
            n => Err(Error::config(format!(
                "hypothesis template \"{}\" has {} {} placeholders, expected one",
                template, n, CANDIDATE_PLACEHOLDER
            ))),
        }
    }

    /// Frame one candidate as an NLI hypothesis
    pub fn render(&self, candidate: &str) -> String {
        self.0.replace(CANDIDATE_PLACEHOLDER, candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HypothesisTemplate {
    fn default() -> Self {
        Self(DEFAULT_HYPOTHESIS_TEMPLATE.to_string())
    }
}

/// Numerically stable softmax over raw logits
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pair candidates with scores and sort by descending score.
///
/// The sort is stable, so ties keep candidate order.
pub fn rank_by_score(candidates: &[String], scores: &[f32]) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = candidates
        .iter()
        .zip(scores)
        .map(|(label, score)| Prediction::new(label.clone(), *score))
        .collect();

    predictions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    predictions
}

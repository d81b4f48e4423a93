//! Mock rankers for testing
//!
//! Configurable implementations of the Ranker trait for exercising the
//! fallback adapter and batch orchestrator without loading a model.

#![allow(dead_code)]

use async_trait::async_trait;
use govstage_classifiers::{
    BatchOrchestrator, FallbackClassifier, HypothesisTemplate, Prediction, Ranker, RuleMatcher,
};
use govstage_core::{Error, Result, StageDescriptions, StageId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A ranker that puts one stage's description on top
pub struct ScriptedRanker {
    top: StageId,
    score: f32,
    call_count: AtomicU32,
    release_count: AtomicU32,
}

impl ScriptedRanker {
    /// Rank `top` first with the given score
    pub fn new(top: StageId, score: f32) -> Self {
        Self {
            top,
            score,
            call_count: AtomicU32::new(0),
            release_count: AtomicU32::new(0),
        }
    }

    /// Get the number of times rank was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the number of release hints received
    pub fn release_count(&self) -> u32 {
        self.release_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Ranker for ScriptedRanker {
    async fn rank(
        &self,
        text: &str,
        candidates: &[String],
        _template: &HypothesisTemplate,
    ) -> Result<Vec<Prediction>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        // Dynamic failure based on text content (for testing)
        if text.contains("EXPLODE") {
            return Err(Error::ranking("scripted failure"));
        }

        let top = self.top.default_description();
        let rest = (1.0 - self.score) / candidates.len().saturating_sub(1).max(1) as f32;

        let mut predictions = vec![Prediction::new(top, self.score)];
        predictions.extend(
            candidates
                .iter()
                .filter(|c| c.as_str() != top)
                .map(|c| Prediction::new(c.clone(), rest)),
        );
        Ok(predictions)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// A ranker that always fails - for testing error paths
pub struct FailingRanker {
    call_count: AtomicU32,
}

impl FailingRanker {
    pub fn new() -> Self {
        Self {
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Ranker for FailingRanker {
    async fn rank(
        &self,
        _text: &str,
        _candidates: &[String],
        _template: &HypothesisTemplate,
    ) -> Result<Vec<Prediction>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Err(Error::ranking("inference backend unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A ranker that panics mid-inference
pub struct PanickingRanker;

#[async_trait]
impl Ranker for PanickingRanker {
    async fn rank(
        &self,
        _text: &str,
        _candidates: &[String],
        _template: &HypothesisTemplate,
    ) -> Result<Vec<Prediction>> {
        panic!("tensor shape mismatch");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// A ranker that names a description outside the candidate set
pub struct StrayLabelRanker;

#[async_trait]
impl Ranker for StrayLabelRanker {
    async fn rank(
        &self,
        _text: &str,
        _candidates: &[String],
        _template: &HypothesisTemplate,
    ) -> Result<Vec<Prediction>> {
        Ok(vec![Prediction::new("a weather report", 0.99)])
    }

    fn name(&self) -> &str {
        "stray"
    }
}

/// Build an orchestrator over the built-in rules and descriptions
pub fn orchestrator(ranker: Arc<dyn Ranker>, chunk_size: usize) -> BatchOrchestrator {
    let fallback = FallbackClassifier::new(
        ranker,
        StageDescriptions::default(),
        HypothesisTemplate::default(),
    );
    BatchOrchestrator::new(RuleMatcher::default(), fallback, chunk_size)
        .expect("valid chunk size")
}

/// Run an orchestrator over in-memory input and collect output lines
pub async fn run_lines(
    orchestrator: &mut BatchOrchestrator,
    input: &str,
) -> (Vec<serde_json::Value>, govstage_classifiers::RunStats) {
    let mut output = Vec::new();
    let stats = orchestrator
        .run(input.as_bytes(), &mut output)
        .await
        .expect("run succeeds");

    let lines = String::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("output line is JSON"))
        .collect();
    (lines, stats)
}

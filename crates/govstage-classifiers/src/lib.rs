//! govstage Classifiers
//!
//! Assigns governance messages to lifecycle stages.
//!
//! Classification runs in two tiers:
//! - Rules: an ordered list of case-insensitive patterns, first match wins,
//!   each carrying a fixed calibrated confidence
//! - Fallback: zero-shot NLI ranking of stage descriptions, used only when
//!   no rule matches
//!
//! The batch orchestrator drives both tiers over a JSON Lines stream.

pub mod batch;
pub mod config;
pub mod fallback;
pub mod framing;
pub mod loader;
#[cfg(feature = "ml-models")]
pub mod nli;
pub mod ranker;
pub mod rules;

pub use batch::{BatchOrchestrator, RunStats};
pub use config::{
    BatchConfigSpec, ClassifierConfig, DeviceSpec, MatcherSpec, ModelConfigSpec, ModelSourceSpec,
    RuleSpec,
};
pub use fallback::{FallbackClassifier, FallbackOutcome};
pub use loader::load_ranker;
pub use ranker::{HypothesisTemplate, Prediction, Ranker};
pub use rules::{PatternRule, RuleMatch, RuleMatcher};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::BatchOrchestrator;
    pub use crate::fallback::{FallbackClassifier, FallbackOutcome};
    pub use crate::ranker::{HypothesisTemplate, Prediction, Ranker};
    pub use crate::rules::{RuleMatch, RuleMatcher};
    pub use govstage_core::prelude::*;
}

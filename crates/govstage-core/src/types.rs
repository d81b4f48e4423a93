//! Core types for govstage

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Id assigned to requests that arrive without one
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Governance lifecycle stage.
///
/// The set is closed: nothing in govstage may emit a stage outside it.
/// Declaration order is also the candidate order presented to the NLI ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    CipDiscuss,
    CipVote,
    CipAnnounce,
    Tokenomics,
    TokenomicsAnnounce,
    SvAnnounce,
    Other,
}

impl StageId {
    /// Every stage, in declaration order
    pub const ALL: [StageId; 7] = [
        StageId::CipDiscuss,
        StageId::CipVote,
        StageId::CipAnnounce,
        StageId::Tokenomics,
        StageId::TokenomicsAnnounce,
        StageId::SvAnnounce,
        StageId::Other,
    ];

    /// Wire name of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CipDiscuss => "cip-discuss",
            Self::CipVote => "cip-vote",
            Self::CipAnnounce => "cip-announce",
            Self::Tokenomics => "tokenomics",
            Self::TokenomicsAnnounce => "tokenomics-announce",
            Self::SvAnnounce => "sv-announce",
            Self::Other => "other",
        }
    }

    /// Built-in candidate description handed to the NLI ranker
    pub fn default_description(&self) -> &'static str {
        match self {
            Self::CipDiscuss => "a discussion of a Canton Improvement Proposal (CIP)",
            Self::CipVote => "a vote on a Canton Improvement Proposal",
            Self::CipAnnounce => "an announcement that a Canton Improvement Proposal was approved",
            Self::Tokenomics => "tokenomics, rewards, or network fees",
            Self::TokenomicsAnnounce => "an announcement of a tokenomics or reward change",
            Self::SvAnnounce => "an announcement by or about super validators",
            Self::Other => "something unrelated to network governance",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::UnknownStage(s.to_string()))
    }
}

/// A single message to classify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// Caller-assigned id, echoed back on the result
    #[serde(default = "default_request_id")]
    pub id: String,

    /// Message body
    #[serde(default)]
    pub text: String,
}

impl ClassificationRequest {
    /// Create a new request
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

fn default_request_id() -> String {
    UNKNOWN_REQUEST_ID.to_string()
}

/// Which path of the pipeline produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Resolved by a pattern rule
    Rule,
    /// Resolved by the NLI fallback ranking
    Fallback,
    /// Empty text or a degraded fallback; always `other` / 0.0
    #[default]
    Default,
}

/// Result of classifying one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Id of the originating request
    pub id: String,

    /// Assigned stage
    pub stage: StageId,

    /// Confidence (0.0-1.0), written rounded to 4 decimal places
    #[serde(serialize_with = "serialize_confidence")]
    pub confidence: f32,

    /// Pipeline path that produced this result (not serialized)
    #[serde(skip)]
    pub resolution: Resolution,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(
        id: impl Into<String>,
        stage: StageId,
        confidence: f32,
        resolution: Resolution,
    ) -> Self {
        Self {
            id: id.into(),
            stage,
            confidence,
            resolution,
        }
    }

    /// The universal safe result: `other` with zero confidence
    pub fn default_for(id: impl Into<String>) -> Self {
        Self::new(id, StageId::Other, 0.0, Resolution::Default)
    }
}

fn serialize_confidence<S: Serializer>(confidence: &f32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_confidence(*confidence))
}

/// Round a confidence to 4 decimal places, clamped to [0, 1].
///
/// Non-finite input maps to 0.0.
pub fn round_confidence(confidence: f32) -> f64 {
    if !confidence.is_finite() {
        return 0.0;
    }
    let clamped = f64::from(confidence).clamp(0.0, 1.0);
    (clamped * 10_000.0).round() / 10_000.0
}

/// Bidirectional mapping between stages and their NLI candidate descriptions.
///
/// Construction validates that every stage has a non-empty description and
/// that no two stages share one, so reverse lookup is unambiguous.
#[derive(Debug, Clone)]
pub struct StageDescriptions {
    /// Candidates in `StageId::ALL` order
    candidates: Vec<(StageId, String)>,
    reverse: HashMap<String, StageId>,
}

impl StageDescriptions {
    /// Build from an explicit mapping covering every stage
    pub fn new(descriptions: HashMap<StageId, String>) -> Result<Self> {
        let mut candidates = Vec::with_capacity(StageId::ALL.len());
        let mut reverse = HashMap::with_capacity(StageId::ALL.len());
        let mut folded: HashMap<String, StageId> = HashMap::with_capacity(StageId::ALL.len());

        for stage in StageId::ALL {
            let description = descriptions
                .get(&stage)
                .map(|d| d.trim().to_string())
                .ok_or_else(|| Error::config(format!("missing description for stage '{}'", stage)))?;

            if description.is_empty() {
                return Err(Error::config(format!(
                    "description for stage '{}' is empty",
                    stage
                )));
            }

            if let Some(existing) = folded.insert(description.to_lowercase(), stage) {
                return Err(Error::config(format!(
                    "stages '{}' and '{}' share the description \"{}\"",
                    existing, stage, description
                )));
            }

            reverse.insert(description.clone(), stage);
            candidates.push((stage, description));
        }

        Ok(Self {
            candidates,
            reverse,
        })
    }

    /// Built-in descriptions with selected stages overridden
    pub fn with_overrides(overrides: &HashMap<StageId, String>) -> Result<Self> {
        let descriptions = StageId::ALL
            .iter()
            .map(|stage| {
                let description = overrides
                    .get(stage)
                    .cloned()
                    .unwrap_or_else(|| stage.default_description().to_string());
                (*stage, description)
            })
            .collect();

        Self::new(descriptions)
    }

    /// Description for a stage
    pub fn description(&self, stage: StageId) -> &str {
        self.candidates
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| d.as_str())
            .unwrap_or_default()
    }

    /// Exact reverse lookup from a candidate description to its stage
    pub fn stage_for(&self, description: &str) -> Option<StageId> {
        self.reverse.get(description).copied()
    }

    /// Candidate descriptions in stage declaration order
    pub fn candidates(&self) -> Vec<String> {
        self.candidates.iter().map(|(_, d)| d.clone()).collect()
    }

    /// Iterate over `(stage, description)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (StageId, &str)> {
        self.candidates.iter().map(|(s, d)| (*s, d.as_str()))
    }
}

impl Default for StageDescriptions {
    fn default() -> Self {
        Self::with_overrides(&HashMap::new()).expect("built-in stage descriptions are distinct")
    }
}

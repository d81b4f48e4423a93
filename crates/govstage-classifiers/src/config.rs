//! Configuration for stage rules, fallback model, and batching

use crate::ranker::{HypothesisTemplate, DEFAULT_HYPOTHESIS_TEMPLATE};
use crate::rules::{default_rule_specs, RuleMatcher};
use govstage_core::{Error, Result, StageDescriptions, StageId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default NLI checkpoint used for the fallback ranking
pub const DEFAULT_NLI_MODEL: &str = "MoritzLaurer/DeBERTa-v3-base-mnli-fever-anli";

/// Complete classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Ordered pattern rules; the first matching rule wins
    #[serde(default = "default_rule_specs")]
    pub rules: Vec<RuleSpec>,

    /// Candidate description overrides, merged onto the built-in set
    #[serde(default)]
    pub descriptions: HashMap<StageId, String>,

    /// Hypothesis framing for the NLI ranker
    #[serde(default = "default_hypothesis_template")]
    pub hypothesis_template: String,

    /// Fallback model settings
    #[serde(default)]
    pub model: ModelConfigSpec,

    /// Batch orchestration settings
    #[serde(default)]
    pub batch: BatchConfigSpec,
}

/// One pattern rule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule name used in diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stage assigned on match
    pub stage: StageId,

    /// Fixed confidence returned on match, in (0, 1]
    pub confidence: f32,

    /// Detection pattern
    #[serde(flatten)]
    pub matcher: MatcherSpec,
}

impl RuleSpec {
    /// Regex-backed rule spec
    pub fn pattern(
        name: impl Into<String>,
        stage: StageId,
        confidence: f32,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            stage,
            confidence,
            matcher: MatcherSpec::Pattern {
                pattern: pattern.into(),
            },
        }
    }

    /// Keyword-backed rule spec
    pub fn keywords(
        name: impl Into<String>,
        stage: StageId,
        confidence: f32,
        keywords: &[&str],
    ) -> Self {
        Self {
            name: Some(name.into()),
            stage,
            confidence,
            matcher: MatcherSpec::Keywords {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            },
        }
    }
}

/// Pattern kind for a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatcherSpec {
    /// Regular expression (case-insensitive)
    Pattern { pattern: String },

    /// Any of a list of literal phrases (case-insensitive)
    Keywords { keywords: Vec<String> },
}

/// Fallback model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfigSpec {
    /// Where to load the NLI checkpoint from
    #[serde(default)]
    pub source: ModelSourceSpec,

    /// Inference device
    #[serde(default)]
    pub device: DeviceSpec,

    /// Maximum encoded length of a (message, hypothesis) pair
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Hugging Face cache directory override
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ModelConfigSpec {
    fn default() -> Self {
        Self {
            source: ModelSourceSpec::default(),
            device: DeviceSpec::default(),
            max_length: default_max_length(),
            cache_dir: None,
        }
    }
}

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSourceSpec {
    /// Local checkpoint directory
    Local { path: PathBuf },

    /// Hugging Face Hub repository
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl ModelSourceSpec {
    /// Interpret a command-line model argument: an existing directory is a
    /// local checkpoint, anything else a Hub repository id.
    pub fn from_cli_arg(value: &str) -> Self {
        let path = Path::new(value);
        if path.is_dir() {
            Self::Local {
                path: path.to_path_buf(),
            }
        } else {
            Self::HuggingFace {
                repo: value.to_string(),
                revision: default_revision(),
            }
        }
    }
}

impl Default for ModelSourceSpec {
    fn default() -> Self {
        Self::HuggingFace {
            repo: DEFAULT_NLI_MODEL.to_string(),
            revision: default_revision(),
        }
    }
}

/// Device specification, written as `cpu`, `cuda`, `cuda:N`, `metal` or `metal:N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

impl FromStr for DeviceSpec {
    type Err = Error;

    /// Accepts `cpu`, `cuda`, `cuda:N`, `metal`, `metal:N`
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        let (kind, index) = match lowered.split_once(':') {
            Some((kind, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_| Error::config(format!("invalid device index in '{}'", s)))?;
                (kind.to_string(), Some(index))
            }
            None => (lowered, None),
        };

        match (kind.as_str(), index) {
            ("cpu", None) => Ok(Self::Cpu),
            ("cuda", index) => Ok(Self::Cuda { index }),
            ("metal" | "mps", index) => Ok(Self::Metal { index }),
            _ => Err(Error::config(format!("unsupported device '{}'", s))),
        }
    }
}

impl TryFrom<String> for DeviceSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda { index: None } => f.write_str("cuda"),
            Self::Cuda { index: Some(i) } => write!(f, "cuda:{}", i),
            Self::Metal { index: None } => f.write_str("metal"),
            Self::Metal { index: Some(i) } => write!(f, "metal:{}", i),
        }
    }
}

impl From<DeviceSpec> for String {
    fn from(device: DeviceSpec) -> Self {
        device.to_string()
    }
}

/// Batch orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfigSpec {
    /// Records per chunk before the release step
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for BatchConfigSpec {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: default_rule_specs(),
            descriptions: HashMap::new(),
            hypothesis_template: default_hypothesis_template(),
            model: ModelConfigSpec::default(),
            batch: BatchConfigSpec::default(),
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Compile the configured rules in order
    pub fn build_rule_matcher(&self) -> Result<RuleMatcher> {
        RuleMatcher::from_specs(&self.rules)
    }

    /// Merge description overrides onto the built-in set and validate
    pub fn build_descriptions(&self) -> Result<StageDescriptions> {
        StageDescriptions::with_overrides(&self.descriptions)
    }

    /// Validate the hypothesis template
    pub fn build_template(&self) -> Result<HypothesisTemplate> {
        HypothesisTemplate::new(self.hypothesis_template.clone())
    }

    /// Validate everything that can be checked without loading the model
    pub fn validate(&self) -> Result<()> {
        self.build_rule_matcher()?;
        self.build_descriptions()?;
        self.build_template()?;

        if self.batch.chunk_size == 0 {
            return Err(Error::config("batch.chunk_size must be at least 1"));
        }
        if self.model.max_length == 0 {
            return Err(Error::config("model.max_length must be at least 1"));
        }

        Ok(())
    }
}

fn default_hypothesis_template() -> String {
    DEFAULT_HYPOTHESIS_TEMPLATE.to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_max_length() -> usize {
    512
}

fn default_chunk_size() -> usize {
    10
}

//! Error types for govstage

/// Result type alias using govstage's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for govstage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors (descriptions, template, batch settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Pattern rule compilation or validation errors
    #[error("rule error: {0}")]
    Rule(String),

    /// Unknown stage name outside the closed stage set
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Ranking capability failures (inference, malformed ranking)
    #[error("ranking error: {0}")]
    Ranking(String),

    /// Model acquisition errors (download, weights, tokenizer)
    #[error("model error: {0}")]
    Model(String),

    /// Malformed input line (not a JSON object with string fields)
    #[error("framing error: {0}")]
    Framing(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new rule error
    pub fn rule(msg: impl Into<String>) -> Self {
        Self::Rule(msg.into())
    }

    /// Create a new ranking error
    pub fn ranking(msg: impl Into<String>) -> Self {
        Self::Ranking(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new framing error
    pub fn framing(msg: impl Into<String>) -> Self {
        Self::Framing(msg.into())
    }
}

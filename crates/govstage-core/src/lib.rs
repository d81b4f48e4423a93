//! govstage Core
//!
//! Core types shared across govstage components.
//!
//! This crate provides:
//! - The closed set of governance lifecycle stages (`StageId`)
//! - Request/result records exchanged with callers
//! - The validated stage ↔ description mapping used by the NLI fallback
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    round_confidence, ClassificationRequest, ClassificationResult, Resolution, StageDescriptions,
    StageId, UNKNOWN_REQUEST_ID,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        ClassificationRequest, ClassificationResult, Resolution, StageDescriptions, StageId,
    };
}

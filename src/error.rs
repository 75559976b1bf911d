//! Typed failures for the index, the quality scorer, and generation.
//!
//! Only [`GenerationError`] reaches callers as a user-visible outcome.
//! Index failures degrade to "no results" at the search layer, and
//! scoring failures are recovered inside the scorer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Historical data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Vector cache corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("No comparable components found for '{query}'")]
    NoComparableContext { query: String },

    #[error("Completion did not contain a usable component: {reason}")]
    MalformedCompletion { reason: String },

    #[error("Completion request failed: {0}")]
    Completion(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Field '{field}' is not a finite number")]
    NonFinite { field: &'static str },
}

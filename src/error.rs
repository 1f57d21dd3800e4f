//! Crate error type
//!
//! Data-quality conditions (bad selectors, empty pages, failed validation) are
//! reported as values. Only malformed enum values and broken records end up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("unknown field name: {0}")]
    UnknownField(String),

    #[error("unknown extraction mode: {0}")]
    UnknownMode(String),

    #[error("unknown page kind: {0}")]
    UnknownPageKind(String),

    #[error("unknown validation criteria: {0}")]
    UnknownCriteria(String),

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("learning service unavailable: {0}")]
    LearningUnavailable(String),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

//! Error types for the analytics engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that stop an analysis run before it produces a report.
///
/// Data that is merely unavailable for one profile, region or resource is not
/// an error at this level; it is recorded as a [`crate::diagnostics::Warning`]
/// on the affected account instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration(message.into())
    }
}

//! Centralized error types for Livecast.

use thiserror::Error;

/// Main error type for Livecast operations.
#[derive(Error, Debug)]
pub enum LivecastError {
    #[error("Invalid signed stream token")]
    InvalidToken,

    #[error("Debounce store error: {0}")]
    DebounceStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for Livecast operations.
pub type LivecastResult<T> = Result<T, LivecastError>;

impl LivecastError {
    /// Create a debounce store error from any displayable cause.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::DebounceStore(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

//! Error types shared across the CCW crates

use thiserror::Error;

/// Result type alias for shared CCW operations
pub type Result<T> = std::result::Result<T, CcwError>;

/// Errors raised by the shared plumbing
#[derive(Error, Debug)]
pub enum CcwError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl CcwError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

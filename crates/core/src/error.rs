//! Error types shared across the workspace.

use thiserror::Error;

/// Errors raised by configuration and data ingestion.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration value is missing or out of range.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

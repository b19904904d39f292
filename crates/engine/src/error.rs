//! Error types for the odds feed and per-market analysis.
//!
//! Numeric problems never become errors: the odds math returns sentinels.
//! These types cover fetch failures (which degrade a run to an
//! error-tagged empty report) and analysis failures local to one market
//! (which are logged and skipped).

use thiserror::Error;

/// Errors that can occur while fetching odds.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The odds feed answered with a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body returned by the feed.
        message: String,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FeedError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Returns true if the error indicates the request should be retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<evscan_core::CoreError> for FeedError {
    fn from(err: evscan_core::CoreError) -> Self {
        match err {
            evscan_core::CoreError::Parse(msg) => Self::Serialization(msg),
            other => Self::Configuration(other.to_string()),
        }
    }
}

/// Errors local to the analysis of one market.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The market cannot be analyzed in its current shape.
    #[error("invalid market {market_key} for event {event_id}: {reason}")]
    InvalidMarket {
        event_id: String,
        market_key: String,
        reason: String,
    },

    /// A calculation produced an unusable value.
    #[error("calculation error: {0}")]
    Calculation(String),
}

impl EngineError {
    /// Creates an invalid market error.
    pub fn invalid_market(
        event_id: impl Into<String>,
        market_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidMarket {
            event_id: event_id.into(),
            market_key: market_key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

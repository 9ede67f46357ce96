//! Error types for price feed operations.

use thiserror::Error;

/// Errors that can occur while fetching the price.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::Status(status.as_u16())
        } else if err.is_decode() {
            FeedError::Parse(err.to_string())
        } else {
            FeedError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on the next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Request(_) | FeedError::Timeout(_) => true,
            FeedError::Status(code) => *code == 429 || *code >= 500,
            FeedError::Parse(_) | FeedError::MissingField(_) | FeedError::InvalidPrice(_) => false,
        }
    }
}

//! Error types for domain values.

use thiserror::Error;

/// Errors raised while building domain values from raw input.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("Slot must be between 1 and 3, got {0}")]
    InvalidSlot(i64),

    #[error("Unknown comparison type: {0}")]
    UnknownComparison(String),
}

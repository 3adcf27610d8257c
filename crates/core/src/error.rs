//! Error types for Boxoffice Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Only {available} seats available")]
    InsufficientCapacity { available: u32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable, machine-checkable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    InsufficientCapacity,
    InvalidState,
    PaymentFailed,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InsufficientCapacity => "insufficient_capacity",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::PaymentFailed => "payment_failed",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InsufficientCapacity { .. } => ErrorKind::InsufficientCapacity,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::PaymentFailed(_) => ErrorKind::PaymentFailed,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Database(_)
            | Error::Config(_)
            | Error::Internal(_)
            | Error::Io(_)
            | Error::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Message safe to hand to a caller. Internal failures are masked.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_reports_remaining() {
        let err = Error::InsufficientCapacity { available: 3 };
        assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
        assert_eq!(err.public_message(), "Only 3 seats available");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = Error::Database(rusqlite::Error::InvalidQuery);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PaymentFailed).unwrap();
        assert_eq!(json, "\"payment_failed\"");
    }
}

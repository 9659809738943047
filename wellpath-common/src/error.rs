//! Common error types for WellPath

use thiserror::Error;

/// Common result type for WellPath operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across WellPath crates
///
/// Only I/O-bound operations produce these. Scoring, matching and pricing
/// degrade to safe defaults instead of failing.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_their_kind() {
        assert_eq!(
            Error::InvalidInput("empty candidate id".to_string()).to_string(),
            "Invalid input: empty candidate id"
        );
        assert_eq!(Error::Config("bad tiers".to_string()).to_string(), "Configuration error: bad tiers");
    }

    #[test]
    fn test_io_and_json_errors_convert() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(io, Error::Io(_)));

        let json: Error = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(json, Error::Json(_)));
    }
}

//! Error types for the site access engine

use crate::types::UserId;
use thiserror::Error;

/// Site access errors
///
/// Only [`AccessError::UserNotFound`] is a domain outcome. Every other
/// variant means the engine could not reach a decision and the caller must
/// fail closed.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The user id does not resolve to any user record
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The directory backend failed (storage error, timeout, poisoned state)
    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Directory snapshot could not be loaded
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccessError {
    /// Whether this error should be surfaced as an authorization failure
    /// (deny, 401/403-class) rather than a server error.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, AccessError::UserNotFound(_))
    }

    /// Create a directory error
    pub fn directory<S: Into<String>>(msg: S) -> Self {
        AccessError::DirectoryUnavailable(msg.into())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        AccessError::DirectoryUnavailable(err.to_string())
    }
}

/// Result type for access operations
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_not_found_is_authorization_failure() {
        assert!(AccessError::UserNotFound("ghost".into()).is_authorization_failure());
        assert!(!AccessError::directory("timeout").is_authorization_failure());
        assert!(!AccessError::InvalidInput("empty".into()).is_authorization_failure());
    }

    #[test]
    fn test_error_display() {
        let err = AccessError::directory("connection refused");
        assert_eq!(err.to_string(), "Directory unavailable: connection refused");

        let err = AccessError::UserNotFound("u-1".into());
        assert_eq!(err.to_string(), "User not found: u-1");
    }
}

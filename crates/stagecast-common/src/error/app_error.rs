//! Application error types
//!
//! Unified error handling for the hub process.

use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Startup errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Endpoint already bound: {0}")]
    BindConflict(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Check if this error is recoverable without restarting the process
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InvalidInput(_) | Self::NotFound(_))
    }

    /// Create a not found error for a resource
    #[must_use]
    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::NotFound(resource.to_string())
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for hub operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_recoverable() {
        assert!(AppError::transport("send failed").is_recoverable());
        assert!(AppError::not_found("room abc").is_recoverable());
        assert!(!AppError::Config("missing HUB_PORT".to_string()).is_recoverable());
        assert!(!AppError::BindConflict("127.0.0.1:4455".to_string()).is_recoverable());
    }

    #[test]
    fn test_helper_methods() {
        let err = AppError::not_found("room main");
        assert_eq!(err.to_string(), "Resource not found: room main");

        let err = AppError::transport("channel closed");
        assert_eq!(err.to_string(), "Transport error: channel closed");
    }
}

//! Typed adapter connection errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection failure reported by an adapter's `do_connect`
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The remote endpoint refused the connection
    #[error("Connection refused: {0}")]
    Refused(String),

    /// The remote endpoint rejected the adapter's credentials
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The connection attempt timed out
    #[error("Connection timed out: {0}")]
    Timeout(String),

    /// The underlying transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// TLS/crypto negotiation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Another process already owns the transport endpoint
    #[error("Endpoint already bound: {0}")]
    BindConflict(String),

    /// Anything else
    #[error("Connection error: {0}")]
    Unknown(String),
}

impl ConnectError {
    /// Classify this error for status reporting
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Refused(_) => ErrorKind::ConnectionRefused,
            Self::AuthFailed(_) => ErrorKind::AuthFailed,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::TransportError,
            Self::Crypto(_) => ErrorKind::CryptoError,
            Self::BindConflict(_) => ErrorKind::BindConflict,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Error classification surfaced to status observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ConnectionRefused,
    AuthFailed,
    Timeout,
    TransportError,
    CryptoError,
    BindConflict,
    Unknown,
}

/// The last recorded connection error of an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ConnectError> for LastError {
    fn from(err: &ConnectError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

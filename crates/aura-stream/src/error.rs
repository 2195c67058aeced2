//! Error types for aura-stream

use thiserror::Error;

/// Result type alias using aura-stream Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the AuraMind backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Bearer token missing, rejected or expired
    #[error("Authentication expired")]
    AuthExpired,

    /// The byte stream broke off
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request aborted by the caller
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a status error from a code and a response body
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        if status == 401 {
            return Self::AuthExpired;
        }
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Check if this error indicates an expired or missing credential
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Error::AuthExpired => true,
            Error::Http(e) => e.status().is_some_and(|s| s.as_u16() == 401),
            _ => false,
        }
    }

    /// Check if this error is worth retrying before a request was accepted
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e
                        .status()
                        .is_some_and(|s| matches!(s.as_u16(), 429 | 502 | 503 | 504))
            }
            Error::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Error::Transport(_) => true,
            _ => false,
        }
    }
}

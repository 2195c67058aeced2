//! Error types for aura-chat

use thiserror::Error;

/// Result type alias using aura-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why a `send` was refused before any request went out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The session lost its credentials; a new one must be built after login
    SessionInvalidated,
    /// No conversation is selected (draft state)
    NoConversation,
    /// The query is empty or only whitespace
    EmptyQuery,
    /// Another exchange is still sending or streaming
    ExchangeInFlight,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::SessionInvalidated => "session is no longer authenticated",
            Rejection::NoConversation => "no conversation selected",
            Rejection::EmptyQuery => "query is empty",
            Rejection::ExchangeInFlight => "an answer is still streaming",
        };
        f.write_str(reason)
    }
}

/// Errors that can occur during chat operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the protocol layer
    #[error(transparent)]
    Stream(#[from] aura_stream::Error),

    /// The call was refused without touching the network
    #[error("Rejected: {0}")]
    Rejected(Rejection),

    /// The server rejected the bearer token; the caller must log in again
    #[error("Authentication expired")]
    AuthExpired,

    /// History could not be loaded
    #[error("History error: {0}")]
    History(String),
}

impl Error {
    /// Check if this error requires the user to log in again
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Error::AuthExpired | Error::Rejected(Rejection::SessionInvalidated) => true,
            Error::Stream(e) => e.is_auth_expired(),
            _ => false,
        }
    }
}

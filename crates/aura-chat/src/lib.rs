//! aura-chat: chat session runtime for the AuraMind backend
//!
//! This crate assembles streamed answers into a conversation transcript and
//! guards the lifecycle of each query: one exchange at a time, stale frames
//! dropped after a conversation switch, and the session invalidated when the
//! server rejects the token.

pub mod auth;
pub mod chat;
pub mod error;
pub mod handle;
pub mod history;
pub mod http;
pub mod transcript;
pub mod transport;

pub use auth::{AuthProvider, Session, StaticToken};
pub use chat::{ChatSession, ExchangeOutcome, FAILURE_NOTICE, HISTORY_FAILURE_NOTICE};
pub use error::{Error, Rejection, Result};
pub use handle::{ChatHandle, GuardState};
pub use history::History;
pub use http::{DEFAULT_API_URL, HttpBackend};
pub use transcript::{TranscriptAssembler, TranscriptSnapshot};
pub use transport::{ByteStream, RetryConfig, Transport};

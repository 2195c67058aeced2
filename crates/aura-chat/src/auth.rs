//! Credentials: the explicit session object and the auth collaborator seam

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Supplies the bearer token and is told when the server rejects it.
pub trait AuthProvider: Send + Sync {
    /// The current bearer token, if the user is logged in
    fn bearer_token(&self) -> Option<String>;

    /// The server reported the token as expired or invalid.
    ///
    /// Implementations clear stored credentials and route the user back to login.
    fn on_auth_expired(&self);
}

/// An in-memory token, e.g. from an environment variable
#[derive(Default)]
pub struct StaticToken {
    token: Mutex<Option<String>>,
    expired: AtomicBool,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
            expired: AtomicBool::new(false),
        }
    }

    /// Whether `on_auth_expired` has been called
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }
}

impl AuthProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn on_auth_expired(&self) {
        self.token.lock().take();
        self.expired.store(true, Ordering::Release);
    }
}

/// The active conversation and the token used to talk about it.
///
/// A session without a conversation id is a draft: nothing can be sent.
/// Once invalidated the token is gone for good; a new session has to be
/// built after the user logs in again.
#[derive(Clone, Default)]
pub struct Session {
    conversation_id: Option<i64>,
    token: Option<String>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self {
            conversation_id: None,
            token,
        }
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn set_conversation(&mut self, conversation_id: Option<i64>) {
        self.conversation_id = conversation_id;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether sending is disabled for lack of a conversation
    pub fn is_draft(&self) -> bool {
        self.conversation_id.is_none()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Discard the token
    pub fn invalidate(&mut self) {
        self.token = None;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conversation_id", &self.conversation_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

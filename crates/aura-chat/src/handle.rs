//! A cloneable handle for poking the chat session from external code.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the session's single exchange slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Ready to send
    Idle,
    /// Query sent, waiting for response headers
    Sending,
    /// Answer frames are arriving
    Streaming,
    /// The server rejected the token; terminal for this session
    Unauthenticated,
}

/// A cloneable handle for poking the chat session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct ChatHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) state: Arc<Mutex<GuardState>>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            state: Arc::new(Mutex::new(GuardState::Idle)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Abort the in-flight exchange, if any.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Current guard state.
    pub fn state(&self) -> GuardState {
        *self.state.lock()
    }

    /// Whether an exchange is sending or streaming.
    pub fn is_busy(&self) -> bool {
        matches!(self.state(), GuardState::Sending | GuardState::Streaming)
    }

    /// Wait until no exchange is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_busy() {
            return;
        }
        notified.await;
    }

    /// Install a fresh token for a new exchange and return it.
    pub(crate) fn reset_cancel(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }

    pub(crate) fn set_state(&self, next: GuardState) {
        let mut state = self.state.lock();
        // Unauthenticated is terminal
        if *state == GuardState::Unauthenticated {
            return;
        }
        *state = next;
        drop(state);
        if !matches!(next, GuardState::Sending | GuardState::Streaming) {
            self.idle_notify.notify_waiters();
        }
    }
}

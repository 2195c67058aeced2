//! Chat session: guards the request lifecycle of each query and keeps the
//! transcript consistent while answers stream in.

use std::sync::Arc;

use aura_stream::{QueryRequest, StreamEvent, frames, interpret};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    auth::{AuthProvider, Session},
    error::{Error, Rejection, Result},
    handle::{ChatHandle, GuardState},
    history::History,
    transcript::{TranscriptAssembler, TranscriptSnapshot},
    transport::{ByteStream, RetryConfig, Transport},
};

/// Shown in place of an answer when the exchange fails
pub const FAILURE_NOTICE: &str =
    "Sorry, I encountered an error. Please ensure the backend and Ollama are running.";

/// Shown when a conversation's history cannot be loaded
pub const HISTORY_FAILURE_NOTICE: &str =
    "Error loading conversation. Please try again or create a new chat.";

/// How a `send` ended, when it did not end in an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The server sent the end-of-stream sentinel
    Completed,
    /// The body ended without the sentinel; the partial answer was kept
    Truncated,
    /// Aborted through the handle; the partial answer was kept, or the bare
    /// query if the server had not answered yet
    Cancelled,
    /// Transport or server failure; a notice was appended
    Failed { message: String },
    /// The conversation was switched while the answer was streaming
    Superseded,
}

/// Transcript plus the epoch that ties in-flight exchanges to it
struct View {
    transcript: TranscriptAssembler,
    epoch: u64,
}

impl View {
    fn is_current(&self, exchange: &Exchange) -> bool {
        self.epoch == exchange.epoch
            && self.transcript.conversation_id() == Some(exchange.conversation_id)
    }
}

/// One query from request to closed answer
struct Exchange {
    id: Uuid,
    conversation_id: i64,
    epoch: u64,
    query: String,
    token: String,
    cancel: CancellationToken,
}

enum StreamEnd {
    Done,
    Exhausted,
    Cancelled,
    Superseded,
    Failed(aura_stream::Error),
}

enum Applied {
    Continue,
    Done,
    Superseded,
}

/// Drives queries for one conversation view.
///
/// Share it behind an `Arc`: `send` takes `&self`, so a second call while an
/// answer is streaming is rejected instead of racing the first one.
pub struct ChatSession {
    session: Mutex<Session>,
    view: Mutex<View>,
    transport: Arc<dyn Transport>,
    history: Arc<dyn History>,
    auth: Arc<dyn AuthProvider>,
    retry_config: RetryConfig,
    handle: ChatHandle,
}

impl ChatSession {
    /// Create a session in draft state with the provider's current token
    pub fn new(
        transport: Arc<dyn Transport>,
        history: Arc<dyn History>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let session = Session::new(auth.bearer_token());
        Self {
            session: Mutex::new(session),
            view: Mutex::new(View {
                transcript: TranscriptAssembler::new(),
                epoch: 0,
            }),
            transport,
            history,
            auth,
            retry_config: RetryConfig::default(),
            handle: ChatHandle::new(),
        }
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Get a cloneable handle for aborting and observing the exchange slot.
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> GuardState {
        self.handle.state()
    }

    /// Copy of the session (conversation id and token presence)
    pub fn session(&self) -> Session {
        self.session.lock().clone()
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.session.lock().conversation_id()
    }

    /// Current transcript
    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.view.lock().transcript.snapshot()
    }

    /// Subscribe to a snapshot per transcript mutation
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptSnapshot> {
        self.view.lock().transcript.subscribe()
    }

    /// Switch to a freshly created conversation with an empty transcript
    pub fn start_conversation(&self, conversation_id: i64) -> Result<()> {
        if self.handle.state() == GuardState::Unauthenticated {
            return Err(Error::Rejected(Rejection::SessionInvalidated));
        }
        self.switch_view(Some(conversation_id));
        Ok(())
    }

    /// Switch the active conversation and load its history.
    ///
    /// `None` returns to the draft state. Any answer still streaming for the
    /// previous conversation is closed and its late frames are dropped.
    pub async fn select_conversation(&self, conversation_id: Option<i64>) -> Result<()> {
        if self.handle.state() == GuardState::Unauthenticated {
            return Err(Error::Rejected(Rejection::SessionInvalidated));
        }
        let epoch = self.switch_view(conversation_id);
        let Some(conversation_id) = conversation_id else {
            return Ok(());
        };

        let Some(token) = self.token() else {
            self.invalidate("no bearer token available");
            return Err(Error::AuthExpired);
        };

        match self.history.load_messages(conversation_id, &token).await {
            Ok(messages) => {
                let mut view = self.view.lock();
                if view.epoch == epoch {
                    tracing::debug!(
                        "Loaded {} messages for conversation {}",
                        messages.len(),
                        conversation_id
                    );
                    view.transcript.load(Some(conversation_id), messages);
                } else {
                    tracing::debug!("Discarding history of conversation {}", conversation_id);
                }
                Ok(())
            }
            Err(e) if e.is_auth_expired() => {
                self.invalidate("history request rejected the bearer token");
                Err(Error::AuthExpired)
            }
            Err(e) => {
                tracing::warn!("Failed to load conversation {}: {}", conversation_id, e);
                let mut view = self.view.lock();
                if view.epoch == epoch {
                    view.transcript.push_notice(HISTORY_FAILURE_NOTICE);
                }
                Err(Error::History(e.to_string()))
            }
        }
    }

    /// Send a query in the active conversation and stream its answer into
    /// the transcript.
    ///
    /// Precondition failures are returned before any request is made. An
    /// authentication failure invalidates the session and returns
    /// [`Error::AuthExpired`]; the caller should route the user to login.
    pub async fn send(&self, query: &str) -> Result<ExchangeOutcome> {
        let exchange = self.begin(query)?;
        tracing::info!(
            exchange = %exchange.id,
            conversation = exchange.conversation_id,
            "Sending query"
        );

        let result = self.drive(&exchange).await;
        self.handle.set_state(GuardState::Idle);

        match &result {
            Ok(outcome) => tracing::info!(exchange = %exchange.id, ?outcome, "Exchange finished"),
            Err(e) => tracing::warn!(exchange = %exchange.id, "Exchange ended: {}", e),
        }
        result
    }

    /// Check preconditions and claim the exchange slot
    fn begin(&self, query: &str) -> Result<Exchange> {
        let mut state = self.handle.state.lock();
        match *state {
            GuardState::Unauthenticated => {
                return Err(Error::Rejected(Rejection::SessionInvalidated));
            }
            GuardState::Sending | GuardState::Streaming => {
                return Err(Error::Rejected(Rejection::ExchangeInFlight));
            }
            GuardState::Idle => {}
        }

        let (conversation_id, token) = {
            let session = self.session.lock();
            (session.conversation_id(), session.token().map(str::to_string))
        };
        let Some(conversation_id) = conversation_id else {
            return Err(Error::Rejected(Rejection::NoConversation));
        };
        if query.trim().is_empty() {
            return Err(Error::Rejected(Rejection::EmptyQuery));
        }
        let Some(token) = token else {
            drop(state);
            self.invalidate("no bearer token available");
            return Err(Error::AuthExpired);
        };

        *state = GuardState::Sending;
        drop(state);

        Ok(Exchange {
            id: Uuid::new_v4(),
            conversation_id,
            epoch: self.view.lock().epoch,
            query: query.to_string(),
            token,
            cancel: self.handle.reset_cancel(),
        })
    }

    async fn drive(&self, exchange: &Exchange) -> Result<ExchangeOutcome> {
        let request = QueryRequest {
            query: exchange.query.clone(),
            conversation_id: exchange.conversation_id,
        };

        let body = match self.open_with_retry(exchange, &request).await {
            Ok(Some(body)) => body,
            Ok(None) => return Ok(self.settle_unaccepted(exchange)),
            Err(e) => return self.fail_unaccepted(exchange, e),
        };

        if !self.accept(exchange) {
            return Ok(ExchangeOutcome::Superseded);
        }

        let mut lines = frames(body);
        let end = loop {
            let next = tokio::select! {
                biased;
                _ = exchange.cancel.cancelled() => None,
                next = lines.next() => Some(next),
            };
            let line = match next {
                None => break StreamEnd::Cancelled,
                Some(None) => break StreamEnd::Exhausted,
                Some(Some(Err(e))) => break StreamEnd::Failed(e),
                Some(Some(Ok(line))) => line,
            };
            let Some(event) = interpret(&line) else {
                continue;
            };
            match self.apply(exchange, &event) {
                Applied::Continue => {}
                Applied::Done => break StreamEnd::Done,
                Applied::Superseded => break StreamEnd::Superseded,
            }
        };
        // Dropping the body aborts the transfer
        drop(lines);

        self.settle(exchange, end)
    }

    /// Open the stream, retrying transient failures until headers arrive.
    ///
    /// `Ok(None)` means the exchange was cancelled while waiting.
    async fn open_with_retry(
        &self,
        exchange: &Exchange,
        request: &QueryRequest,
    ) -> aura_stream::Result<Option<ByteStream>> {
        let mut attempt = 0u32;
        loop {
            let opened = tokio::select! {
                biased;
                _ = exchange.cancel.cancelled() => None,
                opened = self.transport.open(request, &exchange.token) => Some(opened),
            };
            let Some(opened) = opened else {
                return Ok(None);
            };

            match opened {
                Ok(body) => return Ok(Some(body)),
                Err(e) if e.is_retryable() && attempt < self.retry_config.max_retries => {
                    let delay = self.retry_config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Query failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt + 1,
                        self.retry_config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    let slept = tokio::select! {
                        biased;
                        _ = exchange.cancel.cancelled() => false,
                        _ = tokio::time::sleep(delay) => true,
                    };
                    if !slept {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Headers arrived: move to streaming and open the answer.
    fn accept(&self, exchange: &Exchange) -> bool {
        let mut view = self.view.lock();
        if !view.is_current(exchange) {
            return false;
        }
        self.handle.set_state(GuardState::Streaming);
        view.transcript.append(exchange.query.clone());
        true
    }

    fn apply(&self, exchange: &Exchange, event: &StreamEvent) -> Applied {
        let mut view = self.view.lock();
        if !view.is_current(exchange) {
            tracing::debug!(exchange = %exchange.id, "Dropping frame of a superseded exchange");
            return Applied::Superseded;
        }
        view.transcript.apply_event(event);
        if event.is_terminal() {
            Applied::Done
        } else {
            Applied::Continue
        }
    }

    /// Cancelled before the server accepted the query: keep the query visible
    fn settle_unaccepted(&self, exchange: &Exchange) -> ExchangeOutcome {
        let mut view = self.view.lock();
        if !view.is_current(exchange) {
            return ExchangeOutcome::Superseded;
        }
        view.transcript.push_query(exchange.query.clone());
        ExchangeOutcome::Cancelled
    }

    fn fail_unaccepted(
        &self,
        exchange: &Exchange,
        error: aura_stream::Error,
    ) -> Result<ExchangeOutcome> {
        if error.is_auth_expired() {
            {
                let mut view = self.view.lock();
                if view.is_current(exchange) {
                    view.transcript.push_query(exchange.query.clone());
                }
            }
            self.invalidate("server rejected the bearer token");
            return Err(Error::AuthExpired);
        }

        tracing::warn!(exchange = %exchange.id, "Query was not accepted: {}", error);
        let mut view = self.view.lock();
        if !view.is_current(exchange) {
            return Ok(ExchangeOutcome::Superseded);
        }
        view.transcript
            .push_unanswered(exchange.query.clone(), FAILURE_NOTICE);
        Ok(ExchangeOutcome::Failed {
            message: error.to_string(),
        })
    }

    /// Close the answer according to how the stream ended
    fn settle(&self, exchange: &Exchange, end: StreamEnd) -> Result<ExchangeOutcome> {
        let mut view = self.view.lock();
        let current = view.is_current(exchange);

        if let StreamEnd::Failed(e) = &end {
            if e.is_auth_expired() {
                if current {
                    view.transcript.close();
                }
                drop(view);
                self.invalidate("token expired mid-answer");
                return Err(Error::AuthExpired);
            }
        }

        if !current {
            return Ok(ExchangeOutcome::Superseded);
        }

        let outcome = match end {
            StreamEnd::Done => ExchangeOutcome::Completed,
            StreamEnd::Exhausted => {
                tracing::debug!(exchange = %exchange.id, "Stream ended without the sentinel");
                view.transcript.close();
                ExchangeOutcome::Truncated
            }
            StreamEnd::Cancelled => {
                view.transcript.close();
                ExchangeOutcome::Cancelled
            }
            StreamEnd::Superseded => ExchangeOutcome::Superseded,
            StreamEnd::Failed(e) => {
                tracing::warn!(exchange = %exchange.id, "Answer stream failed: {}", e);
                view.transcript.push_notice(FAILURE_NOTICE);
                ExchangeOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };
        Ok(outcome)
    }

    /// Close the current view and start a new epoch for `conversation_id`
    fn switch_view(&self, conversation_id: Option<i64>) -> u64 {
        self.handle.abort();
        self.session.lock().set_conversation(conversation_id);

        let mut view = self.view.lock();
        view.transcript.close();
        view.epoch += 1;
        view.transcript.load(conversation_id, Vec::new());
        view.epoch
    }

    fn token(&self) -> Option<String> {
        self.session.lock().token().map(str::to_string)
    }

    /// Drop the token for good and tell the auth collaborator
    fn invalidate(&self, reason: &str) {
        tracing::warn!("Session invalidated: {}", reason);
        self.session.lock().invalidate();
        self.handle.set_state(GuardState::Unauthenticated);
        self.handle.abort();
        self.auth.on_auth_expired();
    }
}

//! Transcript state: the ordered message list of one conversation view.

use aura_stream::{Message, StreamEvent};
use tokio::sync::broadcast;

/// Number of snapshots a slow subscriber may fall behind before it lags
const SNAPSHOT_CHANNEL_CAPACITY: usize = 256;

/// Read-only view of the transcript after a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSnapshot {
    /// Conversation the transcript belongs to, `None` for a draft
    pub conversation_id: Option<i64>,
    /// Incremented on every mutation
    pub revision: u64,
    pub messages: Vec<Message>,
    /// Index of the assistant message still receiving content
    pub open: Option<usize>,
}

impl TranscriptSnapshot {
    /// Whether an assistant message is still streaming
    pub fn is_streaming(&self) -> bool {
        self.open.is_some()
    }

    /// The most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Owns the message list and applies stream events to the open answer.
///
/// Every mutation publishes a fresh [`TranscriptSnapshot`] to subscribers, so
/// each intermediate delta can be rendered, not just the final text.
#[derive(Debug)]
pub struct TranscriptAssembler {
    conversation_id: Option<i64>,
    messages: Vec<Message>,
    /// Always the last index when set
    open: Option<usize>,
    revision: u64,
    updates: broadcast::Sender<TranscriptSnapshot>,
}

impl Default for TranscriptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptAssembler {
    /// Create an empty draft transcript
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            conversation_id: None,
            messages: Vec::new(),
            open: None,
            revision: 0,
            updates,
        }
    }

    /// Subscribe to snapshots published after each mutation.
    ///
    /// A subscriber more than 256 snapshots behind gets
    /// [`broadcast::error::RecvError::Lagged`] and skips the oldest ones.
    /// Snapshots are cumulative, so the next one received still holds every
    /// delta applied so far; only the intermediate renders are lost.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptSnapshot> {
        self.updates.subscribe()
    }

    /// Current cumulative state
    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            conversation_id: self.conversation_id,
            revision: self.revision,
            messages: self.messages.clone(),
            open: self.open,
        }
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether an assistant message is currently open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Replace the transcript with a loaded (or empty) conversation.
    ///
    /// Any open message is closed first so it cannot leak into the new view.
    pub fn load(&mut self, conversation_id: Option<i64>, messages: Vec<Message>) {
        self.open = None;
        self.conversation_id = conversation_id;
        self.messages = messages;
        self.publish();
    }

    /// Push the user's query and open its empty answer in one mutation
    pub fn append(&mut self, user_text: impl Into<String>) {
        if self.open.take().is_some() {
            tracing::warn!("Closing an answer that was still open when a new query was appended");
        }
        self.messages.push(Message::user(user_text));
        self.messages.push(Message::assistant(String::new()));
        self.open = Some(self.messages.len() - 1);
        self.publish();
    }

    /// Apply one stream event to the open message.
    ///
    /// Without an open message this is a no-op.
    pub fn apply_event(&mut self, event: &StreamEvent) {
        let Some(index) = self.open else {
            if let StreamEvent::CitationSet(citations) = event {
                tracing::warn!(
                    "Discarding {} citations that arrived with no open answer",
                    citations.len()
                );
            }
            return;
        };

        match event {
            StreamEvent::TextDelta(text) => {
                if text.is_empty() {
                    return;
                }
                self.messages[index].content.push_str(text);
                self.publish();
            }
            StreamEvent::CitationSet(citations) => {
                let message = &mut self.messages[index];
                if message.citations.is_some() {
                    tracing::debug!("Replacing citations already set on the open answer");
                }
                message.citations = Some(citations.clone());
                self.publish();
            }
            StreamEvent::End => {
                self.close();
            }
            StreamEvent::Malformed(_) => {}
        }
    }

    /// Freeze the open message. Returns `false` if nothing was open.
    pub fn close(&mut self) -> bool {
        if self.open.take().is_none() {
            return false;
        }
        self.publish();
        true
    }

    /// Append a closed assistant message, e.g. a failure notice
    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.close();
        self.messages.push(Message::assistant(text));
        self.publish();
    }

    /// Record a query whose request failed before it was accepted.
    ///
    /// The query and the notice standing in for its answer land in one
    /// mutation, both closed.
    pub fn push_unanswered(&mut self, user_text: impl Into<String>, notice: impl Into<String>) {
        self.close();
        self.messages.push(Message::user(user_text));
        self.messages.push(Message::assistant(notice));
        self.publish();
    }

    /// Record a query that never got an answer, e.g. one cancelled before
    /// the server accepted it
    pub fn push_query(&mut self, user_text: impl Into<String>) {
        self.open = None;
        self.messages.push(Message::user(user_text));
        self.publish();
    }

    fn publish(&mut self) {
        self.revision += 1;
        if self.updates.receiver_count() > 0 {
            let _ = self.updates.send(self.snapshot());
        }
    }
}

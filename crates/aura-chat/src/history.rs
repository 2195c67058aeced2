//! Conversation history seam

use async_trait::async_trait;
use aura_stream::{Message, Result};

/// Loads the stored transcript of a conversation
#[async_trait]
pub trait History: Send + Sync {
    /// Messages of `conversation_id` in stored order, citations decoded.
    ///
    /// A 401 must surface as [`aura_stream::Error::AuthExpired`].
    async fn load_messages(&self, conversation_id: i64, token: &str) -> Result<Vec<Message>>;
}

//! Core types shared by the chat stream and the history API

use serde::{Deserialize, Serialize};

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// The backend stores assistant turns as `"bot"`
    #[serde(alias = "bot")]
    Assistant,
}

/// A reference to the document snippet that supports part of an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub document_name: String,
    pub pages: String,
    /// Snippet of the cited chunk
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl Citation {
    pub fn new(
        document_name: impl Into<String>,
        pages: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            document_name: document_name.into(),
            pages: pages.into(),
            content: content.into(),
            document_id: None,
        }
    }
}

/// One entry of a conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    /// Creation time in milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Create a user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an assistant message stamped with the current time
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            citations: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Citations attached to this message, empty when none were sent
    pub fn citations(&self) -> &[Citation] {
        self.citations.as_deref().unwrap_or_default()
    }
}

/// Body of `POST /api/chat/query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub conversation_id: i64,
}

/// A message as returned by `GET /api/history/conversations/{id}/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRecord {
    pub role: Role,
    pub content: String,
    /// Citations are stored server-side as a JSON string
    #[serde(default)]
    pub citations: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HistoryRecord {
    /// Decode the stored citations and timestamp into a transcript message.
    ///
    /// A citation string that does not parse is dropped; the message text is kept.
    pub fn into_message(self) -> Message {
        let citations = match self.citations.as_deref() {
            None | Some("") => None,
            Some(raw) => match serde_json::from_str::<Vec<Citation>>(raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("Dropping undecodable citations on history message: {}", e);
                    None
                }
            },
        };
        let timestamp = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_default();

        Message {
            role: self.role,
            content: self.content,
            citations,
            timestamp,
        }
    }
}

/// Parse a backend timestamp, with or without a UTC offset
fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// A conversation as listed by `GET /api/history/conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Response of `POST /api/auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

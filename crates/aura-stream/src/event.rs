//! Typed events carried by `data:` frames

use serde::Deserialize;

use crate::types::Citation;

/// Prefix marking a frame that carries an event
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends a well-formed stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Decoded meaning of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the open answer; may be empty
    TextDelta(String),
    /// The full citation batch for the open answer
    CitationSet(Vec<Citation>),
    /// The server finished the answer
    End,
    /// A data frame that could not be understood, kept verbatim for logging
    Malformed(String),
}

impl StreamEvent {
    /// Check if this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End)
    }

    /// Message of an `{"error": ...}` frame the server sends instead of an answer
    pub fn server_error(&self) -> Option<String> {
        match self {
            StreamEvent::Malformed(raw) => serde_json::from_str::<ErrorPayload>(raw)
                .ok()
                .map(|payload| payload.error),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Payload {
    Chunk { text: String },
    Citations { citations: Vec<Citation> },
}

/// Classify one decoded line.
///
/// Returns `None` for framing that carries no event: blank keep-alives,
/// comments and any line without the `data: ` prefix.
pub fn interpret(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::End);
    }

    let event = match serde_json::from_str::<Payload>(payload) {
        Ok(Payload::Chunk { text }) => StreamEvent::TextDelta(text),
        Ok(Payload::Citations { citations }) => StreamEvent::CitationSet(citations),
        Err(e) => {
            let event = StreamEvent::Malformed(payload.to_string());
            match event.server_error() {
                Some(error) => tracing::warn!("Server reported an error in the stream: {}", error),
                None => tracing::warn!("Skipping malformed frame ({}): {}", e, payload),
            }
            event
        }
    };
    Some(event)
}

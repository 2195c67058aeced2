//! Terminal rendering of transcript snapshots

use aura_chat::TranscriptSnapshot;
use aura_stream::{Citation, Message, Role};

/// Prints the streaming answer incrementally.
///
/// Snapshots carry the full transcript, so the printer remembers how many
/// characters of the open answer it has already written.
#[derive(Debug, Default)]
pub struct AnswerPrinter {
    /// Transcript length before the query was sent
    start: usize,
    index: Option<usize>,
    printed: usize,
}

impl AnswerPrinter {
    /// Printer for the messages appended after the first `start` ones
    pub fn new(start: usize) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    /// Text of the open answer not printed yet
    pub fn delta(&mut self, snapshot: &TranscriptSnapshot) -> Option<String> {
        let index = snapshot.open?;
        if self.index != Some(index) {
            self.index = Some(index);
            self.printed = 0;
        }
        let message = snapshot.messages.get(index)?;
        let text: String = message.content.chars().skip(self.printed).collect();
        if text.is_empty() {
            return None;
        }
        self.printed += text.chars().count();
        Some(text)
    }

    /// Whatever the deltas have not shown yet: the rest of the answer, its
    /// citations, and any assistant message appended after it (notices, or
    /// an answer that completed before a single delta was rendered).
    pub fn finish(&mut self, snapshot: &TranscriptSnapshot) -> String {
        let mut out = String::new();
        let tracked = self
            .index
            .and_then(|i| snapshot.messages.get(i).map(|message| (i, message)));
        let rest = match tracked {
            Some((index, message)) => {
                out.extend(message.content.chars().skip(self.printed));
                out.push('\n');
                push_citations(&mut out, message.citations());
                index + 1
            }
            None => self.start,
        };

        for message in snapshot.messages.iter().skip(rest).filter(|m| !m.is_user()) {
            out.push_str(&message.content);
            out.push('\n');
            push_citations(&mut out, message.citations());
        }

        self.start = snapshot.messages.len();
        self.index = None;
        self.printed = 0;
        out
    }
}

/// One line per citation: `document • Page n`
pub fn citation_lines(citations: &[Citation]) -> Vec<String> {
    citations
        .iter()
        .map(|c| format!("  [{} • Page {}]", c.document_name, c.pages))
        .collect()
}

fn push_citations(out: &mut String, citations: &[Citation]) {
    for line in citation_lines(citations) {
        out.push_str(&line);
        out.push('\n');
    }
}

/// Render a whole transcript, e.g. after opening a conversation
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "aura",
        };
        out.push_str(&format!("{}> {}\n", speaker, message.content));
        push_citations(&mut out, message.citations());
    }
    out
}

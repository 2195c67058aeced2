//! Line framing for the chunked chat response body
//!
//! The server writes one logical frame per `\n`-terminated line, but the
//! network delivers arbitrary byte chunks. [`FrameDecoder`] carries the
//! unterminated tail of each chunk over to the next one, so a frame is only
//! surfaced once its terminator has arrived. Lines are split on raw bytes
//! before UTF-8 decoding; `\n` never occurs inside a multi-byte sequence, so a
//! character split across two reads is reassembled without extra state.

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::error::Result;

/// A stream of complete, decoded lines
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Incremental splitter from byte chunks to complete lines
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completes, in order.
    ///
    /// The terminator (and a preceding `\r`) is stripped. Invalid UTF-8 is
    /// replaced with U+FFFD rather than rejected.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // The carried-over tail never contains a newline
        let mut scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[scan_from..].iter().position(|&b| b == b'\n') {
            let end = scan_from + offset;
            let line = &self.buffer[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
            scan_from = start;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Number of buffered bytes still waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the unterminated remainder once the source has ended.
    ///
    /// Returns how many bytes were discarded, if any.
    pub fn finish(&mut self) -> Option<usize> {
        if self.buffer.is_empty() {
            return None;
        }
        let discarded = self.buffer.len();
        self.buffer.clear();
        tracing::debug!("Discarding {} bytes of unterminated frame at end of stream", discarded);
        Some(discarded)
    }
}

/// Adapt a fallible byte-chunk stream into a lazy stream of lines.
///
/// The first transport error is forwarded and ends the stream; whatever
/// partial line was buffered at that point is never surfaced.
pub fn frames<S, B>(source: S) -> FrameStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(stream! {
        let mut source = Box::pin(source);
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = source.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in decoder.push(bytes.as_ref()) {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "Byte stream failed with {} bytes buffered: {}",
                        decoder.pending(),
                        e
                    );
                    yield Err(e);
                    return;
                }
            }
        }

        decoder.finish();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const BODY: &str = concat!(
        "data: {\"type\":\"citations\",\"citations\":[{\"document_name\":\"Résumé.pdf\",\"pages\":\"[1]\",\"content\":\"x\"}]}\n\n",
        "data: {\"type\":\"chunk\",\"text\":\"Grüße \"}\n\n",
        "data: {\"type\":\"chunk\",\"text\":\"🦀\"}\n\n",
        "data: [DONE]\n\n",
    );

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push(chunk));
        }
        decoder.finish();
        lines
    }

    #[test]
    fn test_whole_body_lines() {
        let lines = decode_chunks(&[BODY.as_bytes()]);
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("data: {\"type\":\"citations\""));
        assert_eq!(lines[1], "");
        assert_eq!(lines[4], "data: {\"type\":\"chunk\",\"text\":\"🦀\"}");
        assert_eq!(lines[6], "data: [DONE]");
    }

    #[test]
    fn test_every_single_split_point_yields_same_lines() {
        let bytes = BODY.as_bytes();
        let expected = decode_chunks(&[bytes]);
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_chunks(&[a, b]), expected, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_yields_same_lines() {
        let bytes = BODY.as_bytes();
        let expected = decode_chunks(&[bytes]);
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_chunks(&chunks), expected);

        for size in [2, 3, 5, 7, 13] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            assert_eq!(decode_chunks(&chunks), expected, "chunk size {}", size);
        }
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let crab = "data: 🦀\n".as_bytes();
        // The crab is four bytes starting at offset 6; split inside it
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&crab[..8]).is_empty());
        assert_eq!(decoder.pending(), 8);
        assert_eq!(decoder.push(&crab[8..]), vec!["data: 🦀".to_string()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_sentinel_split_across_reads() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: [DO").is_empty());
        assert_eq!(decoder.push(b"NE]\n"), vec!["data: [DONE]".to_string()]);
    }

    #[test]
    fn test_crlf_terminators_are_stripped() {
        let mut decoder = FrameDecoder::new();
        let lines = decoder.push(b"data: a\r\n\r\ndata: b\r");
        assert_eq!(lines, vec!["data: a".to_string(), String::new()]);
        assert_eq!(decoder.push(b"\n"), vec!["data: b".to_string()]);
    }

    #[test]
    fn test_unterminated_remainder_is_discarded() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(b"data: one\ndata: {\"type\":\"ch"), vec!["data: one".to_string()]);
        assert_eq!(decoder.finish(), Some(17));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        let lines = decoder.push(b"data: \xff\n");
        assert_eq!(lines, vec!["data: \u{fffd}".to_string()]);
    }

    #[tokio::test]
    async fn test_frames_over_stream() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: {\"type\":\"chunk\",".to_vec()),
            Ok(b"\"text\":\"Hel\"}\n\ndata: [DO".to_vec()),
            Ok(b"NE]\n\ntrailing".to_vec()),
        ];
        let lines: Vec<String> = frames(futures::stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(
            lines,
            vec![
                "data: {\"type\":\"chunk\",\"text\":\"Hel\"}".to_string(),
                String::new(),
                "data: [DONE]".to_string(),
                String::new(),
            ]
        );
    }

    #[tokio::test]
    async fn test_frames_stop_on_transport_error() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: one\ndata: partial".to_vec()),
            Err(Error::Transport("connection reset".into())),
            Ok(b" never seen\n".to_vec()),
        ];
        let mut stream = frames(futures::stream::iter(chunks));

        assert_eq!(stream.next().await.unwrap().unwrap(), "data: one");
        assert!(matches!(stream.next().await, Some(Err(Error::Transport(_)))));
        assert!(stream.next().await.is_none());
    }
}

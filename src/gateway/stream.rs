//! Newline-delimited JSON stream decoding
//!
//! The chat endpoint streams one JSON record per line. Records arrive
//! split across arbitrary byte chunks, so a small accumulator
//! reassembles complete lines before parsing.

use serde::Deserialize;

/// One decoded record from the chat stream
#[derive(Debug, Default, Deserialize)]
pub struct StreamRecord {
    /// Incremental message payload, if any
    #[serde(default)]
    pub message: Option<RecordMessage>,

    /// Set on the final record of a stream
    #[serde(default)]
    pub done: bool,
}

/// Message payload within a stream record
#[derive(Debug, Deserialize)]
pub struct RecordMessage {
    /// Incremental content fragment
    #[serde(default)]
    pub content: String,
}

impl StreamRecord {
    /// Extract the non-empty content fragment, if present
    #[must_use]
    pub fn chunk(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// Parse one stream line into a record
///
/// Malformed lines yield `None`; the caller logs and skips them —
/// a bad line is never fatal to the stream.
#[must_use]
pub fn parse_record(line: &str) -> Option<StreamRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Reassembles complete lines from a byte stream
///
/// Exists only for the lifetime of one streaming call.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed bytes, returning every complete line they close out
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Consume the decoder, returning any trailing unterminated line
    #[must_use]
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}

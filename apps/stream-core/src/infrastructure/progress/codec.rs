//! Event-Line Framing for the Progress Stream
//!
//! The progress endpoint delivers opaque byte chunks; event records are
//! newline-delimited, `data:`-prefixed JSON payloads. This module carves
//! complete lines out of the chunk stream and parses the records.
//!
//! # Framing
//!
//! Chunk boundaries are arbitrary: a multi-byte UTF-8 character (or a line)
//! may straddle two chunks. The decoder therefore buffers raw bytes and
//! defers text decoding until a full line is available — the newline byte is
//! ASCII and can never appear inside a multi-byte sequence, so splitting on
//! it before decoding is lossless. The trailing, possibly-incomplete line
//! stays in the carry-over buffer until more bytes arrive.
//!
//! One malformed line never aborts the stream: undecodable or unparseable
//! lines are dropped with a debug log and the next line is processed
//! normally.

use serde::Deserialize;

/// Prefix marking an event-bearing line.
pub const EVENT_PREFIX: &str = "data:";

// =============================================================================
// Line Decoder
// =============================================================================

/// Incremental newline-delimited decoder over a byte-chunk stream.
#[derive(Debug, Default)]
pub struct LineDecoder {
    carry: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and collect every line completed by it.
    ///
    /// Lines are CRLF-tolerant. Lines that are not valid UTF-8 are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.carry[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let mut raw = &self.carry[consumed..end];
            if raw.last() == Some(&b'\r') {
                raw = &raw[..raw.len() - 1];
            }
            match std::str::from_utf8(raw) {
                Ok(line) => lines.push(line.to_string()),
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping undecodable stream line");
                }
            }
            consumed = end + 1;
        }
        self.carry.drain(..consumed);

        lines
    }

    /// Number of buffered bytes awaiting a line terminator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

// =============================================================================
// Event Records
// =============================================================================

/// One decoded event record from the progress stream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A stage transition for one target of the batch.
    Progress {
        /// Target the transition applies to.
        ticker: String,
        /// Reported stage name.
        stage: String,
        /// Zero-based position of the target within the batch.
        #[serde(rename = "tickerIndex")]
        ticker_index: Option<usize>,
        /// Total number of targets in the batch.
        #[serde(rename = "tickerTotal")]
        ticker_total: Option<usize>,
    },
    /// Terminal record for one target.
    Result {
        /// Target the result applies to.
        ticker: Option<String>,
        /// Present when the batch was rejected before analysis.
        data_quality_error: Option<String>,
        /// Recommendation label for a normal outcome.
        recommendation: Option<String>,
        /// Confidence score for a normal outcome.
        confidence: Option<f64>,
        /// Supporting signals for a normal outcome.
        #[serde(default)]
        signals: Vec<String>,
    },
    /// The backend failed mid-run.
    Error {
        /// Human-readable failure message.
        message: String,
    },
}

/// Decode one complete line into an event record.
///
/// Blank lines, lines without the event prefix, and lines whose payload does
/// not parse all yield `None` — the stream as a whole is never aborted by a
/// single bad line.
#[must_use]
pub fn decode_event_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let payload = line.strip_prefix(EVENT_PREFIX)?.trim_start();
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping malformed event record");
            None
        }
    }
}

//! Line framing for the inbound serial byte stream.
//!
//! A serial read is a *stream* operation: a single read may return less than
//! one complete line, or several lines plus the beginning of the next.  The
//! [`LineFramer`] buffers incoming bytes across reads and extracts complete
//! newline-terminated lines one at a time, retaining the unterminated tail
//! for the next call.
//!
//! # Framing rules
//!
//! - Lines are terminated by `\n`; a trailing `\r` (CRLF endings) is
//!   stripped, as is surrounding ASCII whitespace.
//! - Lines that are empty after trimming are filtered out — they are never
//!   yielded and never forwarded.
//! - Complete lines are yielded in arrival order and never reordered or
//!   dropped.
//! - Bytes that are not valid UTF-8 are decoded lossily; the device side is
//!   a text protocol and garbage bytes only ever appear around resets.
//!
//! The framer is session-scoped: the daemon creates a fresh instance per
//! connected link, so a line split across a disconnect is dropped rather
//! than stitched to data from the next session.

use tracing::trace;

/// Accumulates raw chunks and yields complete, trimmed lines.
///
/// # Example
///
/// ```rust
/// use ttydock_core::LineFramer;
///
/// let mut framer = LineFramer::new();
/// let lines: Vec<String> = framer.feed(b"hel").collect();
/// assert!(lines.is_empty(), "no terminator seen yet");
///
/// let lines: Vec<String> = framer.feed(b"lo\r\nworld\npar").collect();
/// assert_eq!(lines, vec!["hello", "world"]);
/// // "par" stays buffered until a later chunk supplies the `\n`.
/// ```
#[derive(Debug, Default)]
pub struct LineFramer {
    /// Bytes received but not yet terminated by a newline.
    buf: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` to the internal buffer and yields every line that is
    /// now complete, in arrival order.
    ///
    /// The final unterminated segment (possibly empty) is retained for the
    /// next call, so callers may split the input at arbitrary byte
    /// boundaries — including in the middle of a UTF-8 sequence, since
    /// decoding happens only on complete lines.
    pub fn feed(&mut self, chunk: &[u8]) -> impl Iterator<Item = String> {
        self.buf.extend_from_slice(chunk);

        // Find the last newline; everything up to and including it is
        // complete, everything after it is the retained tail.
        let Some(last_newline) = self.buf.iter().rposition(|&b| b == b'\n') else {
            return Vec::new().into_iter();
        };

        let tail = self.buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buf, tail);

        let lines: Vec<String> = complete
            .split(|&b| b == b'\n')
            .map(|seg| String::from_utf8_lossy(seg).trim().to_string())
            .filter(|line| {
                if line.is_empty() {
                    trace!("dropping blank line from inbound stream");
                    false
                } else {
                    true
                }
            })
            .collect();

        lines.into_iter()
    }

    /// Number of buffered bytes still waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

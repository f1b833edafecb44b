//! Pattern buffer with tail-search optimization and consume-on-match.
//!
//! Only the last N bytes of the buffer are searched for prompt patterns —
//! for large outputs (a 600-second image transfer, say) this keeps each
//! search cheap. Prompts arrive at the end of output, so the tail window
//! is where they live.
//!
//! Unlike a plain scan, a match is *consumed*: the text before the match is
//! handed back to the caller and everything through the end of the match is
//! drained, so the next wait starts fresh.

use regex::bytes::Regex;

/// Buffer for accumulating session output and searching it for prompts.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated, ANSI-stripped output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = strip_ansi_escapes::strip(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    /// Search the tail of the buffer for `pattern`.
    ///
    /// Returns the match range as absolute offsets into the buffer.
    pub fn find(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        let tail = &self.buffer[start..];
        pattern
            .find(tail)
            .map(|m| (start + m.start(), start + m.end()))
    }

    /// Consume the buffer through `end`, returning the text before `start`.
    ///
    /// `(start, end)` must come from [`find`](Self::find) on the current
    /// buffer contents.
    pub fn consume_through(&mut self, (start, end): (usize, usize)) -> String {
        let before = String::from_utf8_lossy(&self.buffer[..start]).into_owned();
        self.buffer.drain(..end);
        before
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

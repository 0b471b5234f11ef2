//! Buffer management for process output

use bytes::{Bytes, BytesMut};

use crate::pattern::Match;

/// Initial capacity of a fresh buffer (in bytes)
const INITIAL_CAPACITY: usize = 4096;

/// Unconsumed process output.
///
/// The buffer only grows at the back (the reader loop appends) and only
/// shrinks at the front: a successful match consumes everything up to the end
/// of the match, a drain takes a prefix, and the EOF handoff takes it all.
/// Bytes are never reordered and nothing is discarded for size reasons.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    buffer: BytesMut,
}

impl OutputBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append data to the back of the buffer
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get the buffer as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Remove everything up to the end of `m`.
    ///
    /// Returns the bytes preceding the match and the matched bytes; the rest
    /// of the buffer stays in place.
    pub fn consume(&mut self, m: &Match) -> (Bytes, Bytes) {
        let mut before = self.buffer.split_to(m.end.min(self.buffer.len()));
        let matched = before.split_off(m.start.min(before.len()));
        (before.freeze(), matched.freeze())
    }

    /// Take up to `max` bytes from the front, or everything if `max` is `None`.
    pub fn drain(&mut self, max: Option<usize>) -> Bytes {
        let n = max.map_or(self.buffer.len(), |max| max.min(self.buffer.len()));
        self.buffer.split_to(n).freeze()
    }

    /// Take the whole buffer, leaving it empty.
    pub fn take_all(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Lossy text rendering of the whole buffer, without consuming it.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// The last `limit` characters of the buffer, for error diagnostics.
    pub fn snapshot(&self, limit: usize) -> String {
        let text = String::from_utf8_lossy(&self.buffer);
        let count = text.chars().count();
        if count <= limit {
            return text.into_owned();
        }
        text.chars().skip(count - limit).collect()
    }
}

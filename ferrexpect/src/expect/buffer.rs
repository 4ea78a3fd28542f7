//! Output buffer accumulated by an expect call.
//!
//! Matchers see the whole buffer on every evaluation, so the buffer is capped:
//! once it would grow past `max_len` the oldest bytes are dropped.

use bytes::{Buf, BytesMut};

/// Buffer for accumulating output between matcher evaluations.
#[derive(Debug)]
pub struct OutputBuffer {
    /// The accumulated output.
    buffer: BytesMut,

    /// Upper bound on retained bytes.
    max_len: usize,

    /// Bytes dropped from the front so far.
    discarded: usize,
}

impl OutputBuffer {
    /// Create a buffer retaining at most `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_len.min(4096)),
            max_len: max_len.max(1),
            discarded: 0,
        }
    }

    /// Append data, dropping the oldest bytes past the cap.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > self.max_len {
            let excess = self.buffer.len() - self.max_len;
            self.buffer.advance(excess);
            self.discarded += excess;
        }
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.discarded = 0;
        self.buffer.split().to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of bytes dropped because of the cap.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
        assert_eq!(buffer.discarded(), 0);
    }

    #[test]
    fn test_cap_drops_oldest_bytes() {
        let mut buffer = OutputBuffer::new(8);
        buffer.extend(b"0123456789");
        assert_eq!(buffer.as_slice(), b"23456789");
        assert_eq!(buffer.discarded(), 2);

        buffer.extend(b"ab");
        assert_eq!(buffer.as_slice(), b"456789ab");
        assert_eq!(buffer.discarded(), 4);
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), b"test data");
        assert!(buffer.is_empty());
    }
}

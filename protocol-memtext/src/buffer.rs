//! Receive buffer for one connection.
//!
//! The transport appends whatever chunk it read; the decoder pulls whole
//! lines or fixed-length payloads off the front. Both extraction primitives
//! are all-or-nothing: when the requested frame is not fully buffered they
//! return `None` and leave the buffer untouched, so a decode interrupted by
//! a short read resumes exactly where it stopped.

use bytes::{Bytes, BytesMut};

/// Watermark used while reading reply lines.
pub const LINE_WATERMARK: usize = 1;

pub struct RecvBuffer {
    buf: BytesMut,
    watermark: usize,
}

impl RecvBuffer {
    /// Create an empty buffer with the given initial capacity.
    pub fn new(capacity: usize) -> Self {
        RecvBuffer {
            buf: BytesMut::with_capacity(capacity),
            watermark: LINE_WATERMARK,
        }
    }

    /// Append received bytes. Grows the buffer if necessary.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes currently buffered.
    pub fn data(&self) -> &[u8] {
        &self.buf[..]
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Minimum number of buffered bytes before decoding is worth attempting.
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn set_watermark(&mut self, watermark: usize) {
        self.watermark = watermark;
    }

    /// Returns true once the buffer holds at least `watermark` bytes.
    ///
    /// A zero watermark (zero-length payload pending) is always ready.
    pub fn is_ready(&self) -> bool {
        self.buf.len() >= self.watermark
    }

    fn find_line_end(&self) -> Option<usize> {
        memchr::memmem::find(&self.buf, b"\r\n")
    }

    /// Remove and return one line without its `\r\n` terminator.
    pub fn read_line(&mut self) -> Option<Bytes> {
        let end = self.find_line_end()?;
        let mut line = self.buf.split_to(end + 2);
        line.truncate(end);
        Some(line.freeze())
    }

    /// Remove and return exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize) -> Option<Bytes> {
        if self.buf.len() < n {
            return None;
        }
        Some(self.buf.split_to(n).freeze())
    }

    /// Discard all buffered data and return to line mode.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.watermark = LINE_WATERMARK;
    }
}

impl Default for RecvBuffer {
    fn default() -> Self {
        RecvBuffer::new(0)
    }
}

//! Fixed-capacity receive buffer
//!
//! Each worker owns one of these for the lifetime of a connection. Request
//! heads are accumulated here; once a request is finished the head (and any
//! buffered body bytes) are drained and leftover pipelined bytes slide to
//! the front.

/// Hard ceiling on the size of a request head plus whatever body bytes
/// arrive with it in one read burst.
pub const MAX_REQUEST_SIZE: usize = 16 * 1024;

pub struct RecvBuffer {
    data: Vec<u8>,
    len: usize,
}

impl RecvBuffer {
    pub fn new() -> Self {
        RecvBuffer {
            data: vec![0; MAX_REQUEST_SIZE],
            len: 0,
        }
    }

    /// Bytes currently buffered.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when no more bytes can be appended.
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// The writable tail of the buffer. Follow up with [`advance`].
    ///
    /// [`advance`]: RecvBuffer::advance
    pub fn space(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Record that `n` bytes were read into the space returned by
    /// [`space`](RecvBuffer::space).
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.len + n <= self.data.len());
        self.len += n;
    }

    /// Remove the first `n` bytes, sliding the remainder to the front.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Throw everything away.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the end of an HTTP head in `data`: the index just past the blank
/// line. Accepts both `\r\n\r\n` and bare `\n\n`. Returns `None` when the
/// head is still incomplete.
pub fn find_head_end(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\n' {
            if data.len() > i + 1 && data[i + 1] == b'\n' {
                return Some(i + 2);
            }
            if data.len() > i + 2 && data[i + 1] == b'\r' && data[i + 2] == b'\n' {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_and_consume() {
        let mut buf = RecvBuffer::new();
        buf.space()[..5].copy_from_slice(b"hello");
        buf.advance(5);
        assert_eq!(buf.filled(), b"hello");
        buf.consume(2);
        assert_eq!(buf.filled(), b"llo");
    }

    #[test]
    fn test_full() {
        let mut buf = RecvBuffer::new();
        let n = buf.space().len();
        buf.advance(n);
        assert!(buf.is_full());
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_find_head_end_crlf() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\nHost: x\r\n\r\nrest"), Some(27));
    }

    #[test]
    fn test_find_head_end_bare_lf() {
        assert_eq!(find_head_end(b"GET / HTTP/1.0\n\n"), Some(16));
    }

    #[test]
    fn test_find_head_end_incomplete() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
    }
}

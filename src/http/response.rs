//! HTTP response formatting module
//!
//! Pure byte-level builders for status lines, heads, the single error
//! template, and chunked transfer framing. The connection layer owns the
//! socket; everything here just produces bytes.

use std::fmt::Write as _;

/// Canonical reason phrase for a status code.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        411 => "Length Required",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        417 => "Expectation Failed",
        423 => "Locked",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "Error",
    }
}

/// A response head under construction. Finishes as raw bytes ready for a
/// single write to the socket.
pub struct Head {
    buf: String,
}

impl Head {
    pub fn new(status: u16, reason: &str) -> Head {
        let mut buf = String::with_capacity(256);
        let _ = write!(buf, "HTTP/1.1 {status} {reason}\r\n");
        Head { buf }
    }

    pub fn status(status: u16) -> Head {
        Head::new(status, status_reason(status))
    }

    pub fn header(mut self, name: &str, value: impl std::fmt::Display) -> Head {
        let _ = write!(self.buf, "{name}: {value}\r\n");
        self
    }

    /// `Connection: keep-alive` or `Connection: close`.
    pub fn connection(self, keep_alive: bool) -> Head {
        self.header(
            "Connection",
            if keep_alive { "keep-alive" } else { "close" },
        )
    }

    /// Terminate the head with the blank line.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push_str("\r\n");
        self.buf.into_bytes()
    }
}

/// The uniform error body: `Error <code>: <reason>` on the first line,
/// detail on the second.
pub fn error_body(status: u16, reason: &str, detail: &str) -> String {
    format!("Error {status}: {reason}\n{detail}")
}

/// Status codes that must not carry a message body.
pub fn bodyless(status: u16) -> bool {
    status < 200 || status == 204 || status == 304
}

/// Frame `data` as one chunk of a chunked transfer encoding.
pub fn chunk(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

/// The zero-length terminating chunk.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

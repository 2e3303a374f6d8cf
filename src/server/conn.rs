// Per-connection state and socket plumbing
// One Conn lives for the whole keep-alive session; the request-scoped
// fields are reset by begin_request. Responders write through Conn so
// byte accounting and close bookkeeping stay in one place.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

use chrono::Local;

use crate::http::buffer::RecvBuffer;
use crate::http::response::{bodyless, error_body, Head};
use crate::http::RequestInfo;
use crate::logger::{self, AccessLogEntry};
use crate::server::state::ServerState;
use crate::transport::Stream;

/// Size of the streaming copy buffer used for file and body transfers.
pub const IO_CHUNK: usize = 8 * 1024;

pub struct Conn<'a> {
    pub state: &'a ServerState,
    pub stream: Stream,
    pub peer: SocketAddr,
    pub local: SocketAddr,
    pub is_tls: bool,
    /// Connection arrived on a redirect-to-TLS listener.
    pub is_redirect_listener: bool,

    // Request-scoped, reset by begin_request.
    pub status: u16,
    pub bytes_sent: u64,
    pub must_close: bool,
    pub remote_user: Option<String>,
    /// Declared request body length; `None` is indeterminate and
    /// disqualifies the connection from keep-alive.
    pub content_len: Option<u64>,
    body_remaining: Option<u64>,
    version_11: bool,
    conn_header: Option<String>,
}

impl<'a> Conn<'a> {
    pub fn new(
        state: &'a ServerState,
        stream: Stream,
        peer: SocketAddr,
        local: SocketAddr,
        is_tls: bool,
        is_redirect_listener: bool,
    ) -> Conn<'a> {
        Conn {
            state,
            stream,
            peer,
            local,
            is_tls,
            is_redirect_listener,
            status: 0,
            bytes_sent: 0,
            must_close: false,
            remote_user: None,
            content_len: Some(0),
            body_remaining: Some(0),
            version_11: false,
            conn_header: None,
        }
    }

    /// Reset request-scoped fields from a freshly parsed head.
    pub fn begin_request(&mut self, req: &RequestInfo) {
        self.status = 0;
        self.bytes_sent = 0;
        self.must_close = false;
        self.remote_user = None;
        self.content_len = req.content_length();
        self.body_remaining = self.content_len;
        self.version_11 = req.version == "1.1";
        self.conn_header = req.header("Connection").map(str::to_string);
    }

    /// Write and account. A failed write poisons the connection.
    pub fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        match self.stream.write_all(data) {
            Ok(()) => {
                self.bytes_sent += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.must_close = true;
                Err(e)
            }
        }
    }

    /// Read up to `out.len()` body bytes, consuming buffered bytes that
    /// arrived behind the head before touching the socket.
    pub fn read_body(&mut self, buf: &mut RecvBuffer, out: &mut [u8]) -> io::Result<usize> {
        let want = match self.body_remaining {
            Some(rem) => out.len().min(usize::try_from(rem).unwrap_or(usize::MAX)),
            None => out.len(),
        };
        if want == 0 {
            return Ok(0);
        }

        let buffered = buf.len().min(want);
        let n = if buffered > 0 {
            out[..buffered].copy_from_slice(&buf.filled()[..buffered]);
            buf.consume(buffered);
            buffered
        } else {
            self.stream.read(&mut out[..want])?
        };

        if let Some(rem) = self.body_remaining {
            self.body_remaining = Some(rem.saturating_sub(n as u64));
        }
        Ok(n)
    }

    /// Stream the whole request body into `sink`, honoring
    /// `Expect: 100-continue`. Sends the error response itself when the
    /// body cannot be forwarded; returns whether the full body arrived.
    pub fn forward_body(
        &mut self,
        buf: &mut RecvBuffer,
        req: &RequestInfo,
        sink: &mut dyn Write,
    ) -> bool {
        if self.content_len.is_none() {
            self.send_error(411, "Content-Length header missing", Some(req));
            self.must_close = true;
            return false;
        }
        match req.header("Expect") {
            Some(e) if e.eq_ignore_ascii_case("100-continue") => {
                let _ = self.write_bytes(b"HTTP/1.1 100 Continue\r\n\r\n");
            }
            Some(_) => {
                self.send_error(417, "Unsupported Expect value", Some(req));
                self.must_close = true;
                return false;
            }
            None => {}
        }

        let mut chunk = [0u8; IO_CHUNK];
        while self.body_remaining.is_some_and(|r| r > 0) {
            let n = match self.read_body(buf, &mut chunk) {
                Ok(0) => {
                    // Peer quit mid-body; nothing sensible to answer.
                    self.must_close = true;
                    return false;
                }
                Ok(n) => n,
                Err(_) => {
                    self.must_close = true;
                    return false;
                }
            };
            if sink.write_all(&chunk[..n]).is_err() {
                self.send_error(500, "Error writing request body", Some(req));
                self.must_close = true;
                return false;
            }
        }
        true
    }

    /// Drop whatever of the request body the responder left unread.
    /// Unread bytes still in the socket would corrupt the framing of the
    /// next pipelined request, so their presence forces a close.
    pub fn discard_body(&mut self, buf: &mut RecvBuffer) {
        match self.body_remaining {
            Some(rem) => {
                let n = buf.len().min(usize::try_from(rem).unwrap_or(usize::MAX));
                buf.consume(n);
                let left = rem - n as u64;
                self.body_remaining = Some(left);
                if left > 0 {
                    self.must_close = true;
                }
            }
            None => buf.clear(),
        }
    }

    /// The full keep-alive predicate for the current request.
    pub fn should_keep_alive(&self) -> bool {
        if self.state.stopping()
            || !self.state.conf.enable_keep_alive
            || self.content_len.is_none()
            || self.must_close
            || self.status == 401
            || self.status >= 500
        {
            return false;
        }
        match &self.conn_header {
            Some(h) => h.eq_ignore_ascii_case("keep-alive"),
            None => self.version_11,
        }
    }

    /// Send the uniform error response, giving the embedding hook first
    /// refusal.
    pub fn send_error(&mut self, status: u16, detail: &str, req: Option<&RequestInfo>) {
        self.status = status;
        if self.state.events.handle_error(&mut self.stream, status, req) {
            return;
        }
        let body = if bodyless(status) {
            String::new()
        } else {
            error_body(status, crate::http::status_reason(status), detail)
        };
        let head = Head::status(status)
            .header("Content-Length", body.len())
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Date", crate::http::cache::http_date_now())
            .connection(self.should_keep_alive())
            .finish();
        let _ = self.write_bytes(&head);
        if !body.is_empty() && req.map(|r| r.method.as_str()) != Some("HEAD") {
            let _ = self.write_bytes(body.as_bytes());
        }
    }

    /// 301/302 with an empty body.
    pub fn send_redirect(&mut self, status: u16, location: &str) {
        self.status = status;
        let head = Head::status(status)
            .header("Location", location)
            .header("Content-Length", 0)
            .connection(self.should_keep_alive())
            .finish();
        let _ = self.write_bytes(&head);
    }

    /// One combined-format line per finished request.
    pub fn log_access(&self, req: &RequestInfo) {
        if !logger::access_enabled() {
            return;
        }
        let entry = AccessLogEntry {
            remote_addr: self.peer.ip().to_string(),
            remote_user: self.remote_user.clone(),
            time: Local::now(),
            method: req.method.clone(),
            uri: req.uri.clone(),
            http_version: req.version.clone(),
            status: self.status,
            bytes_sent: self.bytes_sent,
            referer: req.header("Referer").map(str::to_string),
            user_agent: req.header("User-Agent").map(str::to_string),
        };
        logger::log_access(&entry);
    }

    /// Error reporting with client and request-line context.
    pub fn report(&self, req: Option<&RequestInfo>, message: &str) {
        let line = req.map(|r| format!("{} {}", r.method, r.uri));
        self.state
            .report_error(Some(self.peer), line.as_deref(), message);
    }

    /// Graceful teardown: announce EOF, swallow in-flight client bytes
    /// so buffered response data is not reset away, then drop.
    pub fn close(mut self) {
        let _ = self.stream.shutdown_write();
        let _ = self
            .stream
            .set_read_timeout(Some(std::time::Duration::from_millis(500)));
        self.stream.drain();
    }
}

//! Embedding callback hooks
//!
//! An application that embeds the server implements [`EventHandler`] to
//! observe the request lifecycle and, optionally, to take requests over
//! before the builtin responders see them.

use std::io::Write;
use std::net::SocketAddr;

use crate::http::RequestInfo;

/// Lifecycle hooks invoked by worker threads. All methods have no-op
/// defaults; implementors override the ones they care about.
///
/// Handlers are shared across workers, so implementations must be
/// `Send + Sync` and should not block for long.
pub trait EventHandler: Send + Sync {
    /// A connection passed the ACL and was queued for a worker.
    fn connection_accepted(&self, _peer: SocketAddr) {}

    /// A request head was parsed and authorized. Return `true` after
    /// writing a complete response to `out` to claim the request; the
    /// builtin responders are then skipped. Note that claiming a request
    /// with an unread body forces the connection closed afterwards.
    fn handle_request(&self, _out: &mut dyn Write, _req: &RequestInfo) -> bool {
        false
    }

    /// An error response is about to be sent. Return `true` after
    /// writing a complete replacement response to suppress the builtin
    /// error template.
    fn handle_error(&self, _out: &mut dyn Write, _status: u16, _req: Option<&RequestInfo>) -> bool {
        false
    }

    /// A request finished with the given status.
    fn request_done(&self, _req: &RequestInfo, _status: u16) {}

    /// A worker thread started.
    fn thread_started(&self) {}

    /// A worker thread is about to exit.
    fn thread_stopping(&self) {}

    /// An error log line is about to be written. Return `true` to
    /// suppress the builtin logger for this line.
    fn log_message(&self, _message: &str) -> bool {
        false
    }
}

/// The default handler: observes nothing, claims nothing.
pub struct NoopEvents;

impl EventHandler for NoopEvents {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_defaults() {
        let h = NoopEvents;
        let req = RequestInfo::parse(b"GET / HTTP/1.1\r\n\r\n").expect("parse");
        let mut sink = Vec::new();
        assert!(!h.handle_request(&mut sink, &req));
        assert!(!h.handle_error(&mut sink, 404, Some(&req)));
        assert!(!h.log_message("x"));
        assert!(sink.is_empty());
    }
}

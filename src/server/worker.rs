// Worker thread: the request loop
// Each worker parks in recv() on the rendezvous channel, serves one
// connection to completion (including its keep-alive successors), then
// goes back for the next. Channel disconnect is the shutdown signal.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use std::io::Read;

use crate::handler;
use crate::http::buffer::{find_head_end, RecvBuffer};
use crate::http::RequestInfo;
use crate::server::conn::Conn;
use crate::server::handoff::Accepted;
use crate::server::state::ServerState;
use crate::transport::Stream;

pub fn run(state: &Arc<ServerState>, rx: &Receiver<Accepted>) {
    state.events.thread_started();
    while let Ok(accepted) = rx.recv() {
        serve_connection(state, accepted);
    }
    state.events.thread_stopping();
}

fn serve_connection(state: &ServerState, accepted: Accepted) {
    let Accepted {
        socket,
        peer,
        local,
        tls,
        redirect,
    } = accepted;

    let stream = if tls {
        let Some(provider) = state.tls.as_ref() else {
            return;
        };
        match provider.accept(socket) {
            Ok(session) => Stream::Tls(session),
            Err(e) => {
                state.report_error(Some(peer), None, &format!("TLS handshake failed: {e}"));
                return;
            }
        }
    } else {
        Stream::Plain(socket)
    };

    let mut conn = Conn::new(state, stream, peer, local, tls, redirect);
    let mut buf = RecvBuffer::new();

    loop {
        let Some(req) = read_request(&mut conn, &mut buf) else {
            break;
        };
        conn.begin_request(&req);

        if !req.is_supported_version() {
            conn.send_error(505, "HTTP version not supported", Some(&req));
            conn.log_access(&req);
            break;
        }

        handler::handle_request(&mut conn, &mut buf, &req);

        conn.log_access(&req);
        state.events.request_done(&req, conn.status);

        conn.discard_body(&mut buf);
        if !conn.should_keep_alive() {
            break;
        }
    }

    conn.close();
}

/// Accumulate one request head. Returns `None` when the connection is
/// done for: clean EOF before any bytes (silent close), a timeout, an
/// overlong head (413), or an unparseable one (400).
fn read_request(conn: &mut Conn, buf: &mut RecvBuffer) -> Option<RequestInfo> {
    loop {
        if let Some(head_len) = find_head_end(buf.filled()) {
            let head = &buf.filled()[..head_len];
            let parsed = RequestInfo::parse(head);
            buf.consume(head_len);
            return match parsed {
                Some(req) => Some(req),
                None => {
                    conn.must_close = true;
                    conn.send_error(400, "Cannot parse HTTP request", None);
                    None
                }
            };
        }

        if buf.is_full() {
            conn.must_close = true;
            conn.send_error(413, "Request head is too large", None);
            return None;
        }
        if conn.state.stopping() {
            return None;
        }

        let n = match conn.stream.read(buf.space()) {
            Ok(0) | Err(_) => {
                // EOF or timeout mid-head: close without a response.
                return None;
            }
            Ok(n) => n,
        };
        buf.advance(n);
    }
}

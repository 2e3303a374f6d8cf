// Master acceptor thread
// Sweeps all non-blocking listeners, screens peers against the ACL,
// configures accepted sockets, and blocks in the rendezvous send until
// a worker takes each one. Also owns the shutdown sequence.

use std::io;
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use socket2::SockRef;

use crate::logger;
use crate::server::handoff::Accepted;
use crate::server::listener::BoundListener;
use crate::server::state::{ServerState, STOPPED};

/// How long the acceptor naps when no listener had a pending connection.
const IDLE_SLEEP: Duration = Duration::from_millis(50);

pub fn run(
    state: &Arc<ServerState>,
    listeners: Vec<BoundListener>,
    tx: Sender<Accepted>,
    workers: Vec<JoinHandle<()>>,
) {
    while !state.stopping() {
        let mut accepted_any = false;
        for l in &listeners {
            // Drain everything pending on this listener before moving on.
            loop {
                match l.listener.accept() {
                    Ok((socket, peer)) => {
                        accepted_any = true;
                        dispatch(state, &tx, l, socket, peer);
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        logger::log_warning(&format!("accept on {}: {e}", l.addr));
                        break;
                    }
                }
            }
        }
        if !accepted_any {
            thread::sleep(IDLE_SLEEP);
        }
    }

    // Shutdown: close the listening sockets, then drop the sender so
    // every parked worker sees a disconnect and exits its recv loop.
    drop(listeners);
    drop(tx);
    for w in workers {
        let _ = w.join();
    }
    // Last action: whoever waits in Server::stop may now return.
    state.stop.store(STOPPED, Ordering::SeqCst);
}

fn dispatch(
    state: &Arc<ServerState>,
    tx: &Sender<Accepted>,
    l: &BoundListener,
    socket: TcpStream,
    peer: std::net::SocketAddr,
) {
    if !state.conf.acl.permits(peer.ip()) {
        // Screened out: close immediately, no response.
        logger::log_warning(&format!("acl: denied connection from {}", peer.ip()));
        return;
    }
    if let Err(e) = configure_socket(state, &socket) {
        logger::log_warning(&format!("socket setup for {peer}: {e}"));
        return;
    }
    state.events.connection_accepted(peer);
    let local = socket.local_addr().unwrap_or(l.addr);
    // Blocks until a worker rendezvouses; this is the backpressure.
    let _ = tx.send(Accepted {
        socket,
        peer,
        local,
        tls: l.tls,
        redirect: l.redirect,
    });
}

/// Per-socket options applied before handoff: blocking mode (accepted
/// sockets can inherit the listener's non-blocking flag), TCP keepalive,
/// close-on-exec so CGI children do not hold client sockets open, a
/// lingering close, and the single request timeout for reads and writes.
fn configure_socket(state: &ServerState, socket: &TcpStream) -> io::Result<()> {
    socket.set_nonblocking(false)?;
    let sock = SockRef::from(socket);
    sock.set_keepalive(true)?;
    sock.set_linger(Some(Duration::from_secs(1)))?;
    #[cfg(unix)]
    sock.set_cloexec(true)?;
    socket.set_read_timeout(state.conf.request_timeout)?;
    socket.set_write_timeout(state.conf.request_timeout)?;
    Ok(())
}

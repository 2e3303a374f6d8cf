// Acceptor-to-worker rendezvous
// A zero-capacity channel: the acceptor blocks in send() until an idle
// worker arrives in recv(). Full workers therefore push back on accept
// naturally, and dropping the sender is the shutdown broadcast that
// wakes every parked worker exactly once.

use std::net::{SocketAddr, TcpStream};

use crossbeam_channel::{Receiver, Sender};

/// One accepted connection travelling from the acceptor to a worker.
pub struct Accepted {
    pub socket: TcpStream,
    pub peer: SocketAddr,
    pub local: SocketAddr,
    /// Came in on a TLS listener; the worker performs the handshake.
    pub tls: bool,
    /// Came in on a redirect listener.
    pub redirect: bool,
}

/// Build the rendezvous channel shared by the acceptor and the pool.
pub fn channel() -> (Sender<Accepted>, Receiver<Accepted>) {
    crossbeam_channel::bounded(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn dummy_accepted() -> Accepted {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let socket = TcpStream::connect(addr).expect("connect");
        Accepted {
            peer: socket.local_addr().expect("peer"),
            local: addr,
            socket,
            tls: false,
            redirect: false,
        }
    }

    #[test]
    fn test_send_blocks_until_received() {
        let (tx, rx) = channel();
        let sender = thread::spawn(move || {
            tx.send(dummy_accepted()).expect("send");
        });
        // The sender cannot finish before this recv happens.
        thread::sleep(Duration::from_millis(20));
        assert!(!sender.is_finished());
        rx.recv().expect("recv");
        sender.join().expect("join");
    }

    #[test]
    fn test_sender_drop_wakes_all_receivers() {
        let (tx, rx) = channel();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || rx.recv().is_err())
            })
            .collect();
        drop(rx);
        thread::sleep(Duration::from_millis(20));
        drop(tx);
        for w in workers {
            assert!(w.join().expect("join"), "worker saw disconnect");
        }
    }
}

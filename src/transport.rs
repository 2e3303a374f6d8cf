//! Stream abstraction over plain TCP and pluggable TLS
//!
//! The engine never links a TLS implementation itself. An embedding
//! application installs a [`TlsProvider`]; listeners marked `s` in the
//! port spec hand accepted sockets to it and the rest of the engine
//! reads and writes the resulting session like any other stream.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// An established TLS session over an accepted socket.
pub trait TlsSession: Read + Write + Send {
    /// Send the protocol close notification. The underlying socket is
    /// closed separately by the connection teardown.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Factory turning accepted sockets into TLS sessions. Implementations
/// perform the handshake before returning.
pub trait TlsProvider: Send + Sync {
    fn accept(&self, stream: TcpStream) -> io::Result<Box<dyn TlsSession>>;
}

/// A connection stream, plain or encrypted.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<dyn TlsSession>),
}

impl Stream {
    /// Begin teardown: TLS close-notify for encrypted sessions, then a
    /// write-side shutdown so the peer sees EOF.
    pub fn shutdown_write(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(s) => s.shutdown(Shutdown::Write),
            Stream::Tls(s) => s.shutdown(),
        }
    }

    /// Swallow whatever the peer still has in flight so the final close
    /// does not trigger a connection reset before buffered response
    /// bytes reach the client. Stops on EOF, error, or timeout.
    pub fn drain(&mut self) {
        let mut scratch = [0u8; 1024];
        loop {
            match self.read(&mut scratch) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    /// Shorten the read timeout for the drain phase.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> io::Result<()> {
        match self {
            Stream::Plain(s) => s.set_read_timeout(timeout),
            // The session owns the socket; leave its timeout alone.
            Stream::Tls(_) => Ok(()),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

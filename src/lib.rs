//! meerkat — an embeddable threaded HTTP/1.x and WebDAV server engine.
//!
//! The engine runs entirely on OS threads: one acceptor sweeps the
//! configured listeners and hands each accepted connection to a fixed
//! pool of workers over a rendezvous channel, so a saturated pool
//! naturally pushes back on the accept loop. Each worker drives a
//! keep-alive request loop serving static files (with ranges,
//! conditional requests and gzip siblings), directory listings, the
//! WebDAV file-management subset, CGI scripts and server-side includes.
//!
//! Embedders start a server with [`server::Server::start`] or, to
//! intercept requests and provide TLS, [`server::Server::start_with`]
//! together with an [`events::EventHandler`] and a
//! [`transport::TlsProvider`].

pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod transport;

pub use config::Config;
pub use error::ConfigError;
pub use events::EventHandler;
pub use server::Server;

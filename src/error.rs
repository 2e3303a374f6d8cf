// Startup error types
// Everything here is fatal: the server refuses to start rather than run
// with a partially applied configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors detected while turning the configuration into a running server.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listening port spec '{0}': expected [ip_address:]port[s|r]")]
    InvalidPortSpec(String),

    #[error("cannot bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("listener marked 's' but no TLS provider is installed")]
    TlsNotConfigured,

    #[error("invalid ACL rule '{0}': expected [+|-]a.b.c.d[/bits]")]
    InvalidAclRule(String),

    #[error("invalid URL rewrite '{0}': expected uri_prefix=replacement")]
    InvalidRewrite(String),

    #[error("cannot open auth file {path}: {source}")]
    AuthFile { path: PathBuf, source: io::Error },

    #[error("configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("cannot start worker thread: {0}")]
    Spawn(io::Error),
}

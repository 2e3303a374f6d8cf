//! Logger module
//!
//! Provides logging utilities for the server:
//! - Server lifecycle logging
//! - Access logging in Apache combined format
//! - Error and warning logging with client context
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use std::net::SocketAddr;

use chrono::Local;

use crate::config::Config;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        opt(&config.logging.access_log_file),
        opt(&config.logging.error_log_file),
    )
}

fn opt(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn log_error(message: &str) {
    write_error(&format!("[{}] [error] {message}", timestamp()));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[{}] [warn] {message}", timestamp()));
}

/// Error with client and request context, e.g.
/// `[2026-08-29 12:00:00] [error] [client 1.2.3.4] GET /x: open failed`
pub fn log_request_error(peer: Option<SocketAddr>, request: Option<&str>, message: &str) {
    let mut line = format!("[{}] [error] ", timestamp());
    if let Some(peer) = peer {
        line.push_str(&format!("[client {}] ", peer.ip()));
    }
    if let Some(request) = request {
        line.push_str(request);
        line.push_str(": ");
    }
    line.push_str(message);
    write_error(&line);
}

/// True when a formatted access line would actually go somewhere.
pub fn access_enabled() -> bool {
    writer::get().is_some_and(writer::LogWriter::access_enabled)
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry) {
    if let Some(w) = writer::get() {
        w.write_access(&entry.format());
    }
}

pub fn log_server_start(addrs: &[SocketAddr], num_threads: usize, config: &Config) {
    println!("======================================");
    println!("Server started successfully");
    for addr in addrs {
        println!("Listening on: {addr}");
    }
    println!("Worker threads: {num_threads}");
    if let Some(path) = opt(&config.logging.access_log_file) {
        println!("Access log: {path}");
    }
    if let Some(path) = opt(&config.logging.error_log_file) {
        println!("Error log: {path}");
    }
    if !config.web.document_root.is_empty() {
        println!("Document root: {}", config.web.document_root);
    }
    println!("======================================");
}

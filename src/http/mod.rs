//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the
//! connection and responder logic: head parsing, the receive buffer, glob
//! patterns, MIME lookup, range and cache arithmetic, and raw response
//! formatting.

pub mod buffer;
pub mod cache;
pub mod mime;
pub mod pattern;
pub mod range;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use buffer::{find_head_end, RecvBuffer, MAX_REQUEST_SIZE};
pub use range::parse_range_header;
pub use request::RequestInfo;
pub use response::status_reason;

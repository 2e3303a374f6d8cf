//! Basic authentication against password files
//!
//! A password file holds one `user:password` or `user:realm:password`
//! line per account; lines whose realm does not match the configured
//! realm are skipped, as are blank lines and `#` comments.
//!
//! Reads are gated by the optional global auth file; PUT/DELETE/MKCOL
//! are gated by the separate put-delete auth file and are refused
//! outright when none is configured.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::http::response::Head;
use crate::http::RequestInfo;
use crate::server::conn::Conn;
use crate::server::state::RuntimeConfig;

/// Credentials presented in an `Authorization: Basic` header.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.trim().strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Validate the request's credentials against one password file.
/// Returns the authenticated user name on success.
fn check_file(file: &Path, realm: &str, req: &RequestInfo) -> Option<String> {
    let (user, pass) = parse_basic(req.header("Authorization")?)?;
    let content = std::fs::read_to_string(file).ok()?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(3, ':');
        let (fu, second, third) = (fields.next()?, fields.next()?, fields.next());
        let (file_realm, file_pass) = match third {
            Some(p) => (Some(second), p),
            None => (None, second),
        };
        if fu == user && file_realm.is_none_or(|r| r == realm) && file_pass == pass {
            return Some(user);
        }
    }
    None
}

/// Read authorization: open access unless a global auth file is set.
pub fn authorize_read(conf: &RuntimeConfig, req: &RequestInfo) -> (bool, Option<String>) {
    match &conf.global_auth_file {
        None => (true, None),
        Some(file) => match check_file(file, &conf.auth_realm, req) {
            Some(user) => (true, Some(user)),
            None => (false, None),
        },
    }
}

/// Write authorization: refused entirely without a put-delete auth file.
pub fn authorize_write(conf: &RuntimeConfig, req: &RequestInfo) -> (bool, Option<String>) {
    match &conf.put_delete_auth_file {
        None => (false, None),
        Some(file) => match check_file(file, &conf.auth_realm, req) {
            Some(user) => (true, Some(user)),
            None => (false, None),
        },
    }
}

/// 401 with the Basic challenge for the configured realm.
pub fn send_challenge(conn: &mut Conn) {
    conn.status = 401;
    let head = Head::status(401)
        .header(
            "WWW-Authenticate",
            format!("Basic realm=\"{}\"", conn.state.conf.auth_realm),
        )
        .header("Content-Length", 0)
        .connection(conn.should_keep_alive())
        .finish();
    let _ = conn.write_bytes(&head);
}

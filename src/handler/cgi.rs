//! CGI gateway
//!
//! Spawns the script (or its configured interpreter) with the CGI/1.1
//! environment, forwards the request body to its stdin, then parses the
//! script's header block and relays status, headers and body back to
//! the client.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::http::buffer::{find_head_end, RecvBuffer};
use crate::http::response::Head;
use crate::http::{cache, RequestInfo};
use crate::server::conn::{Conn, IO_CHUNK};

/// Largest header block a script may emit.
const CGI_HEAD_MAX: usize = 16 * 1024;

pub fn handle_cgi(
    conn: &mut Conn,
    buf: &mut RecvBuffer,
    req: &RequestInfo,
    uri: &str,
    path: &Path,
    path_info: Option<&str>,
) {
    let dir = path.parent().unwrap_or(Path::new("."));
    let script = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let Some(script) = script else {
        conn.send_error(500, "Bad CGI script path", Some(req));
        return;
    };

    let mut command = match &conn.state.conf.cgi_interpreter {
        Some(interp) => {
            let mut c = Command::new(interp);
            c.arg(&script);
            c
        }
        None => Command::new(format!("./{script}")),
    };
    command
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_clear()
        .envs(environment(conn, req, uri, path, path_info));

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            conn.report(Some(req), &format!("cannot spawn CGI {}: {e}", path.display()));
            conn.send_error(500, "Cannot spawn CGI process", Some(req));
            return;
        }
    };

    // POST body goes to the script before we expect any output.
    if req.method == "POST" {
        let forwarded = match child.stdin.take() {
            Some(mut stdin) => conn.forward_body(buf, req, &mut stdin),
            None => false,
        };
        if !forwarded {
            finish_child(&mut child);
            return;
        }
    } else {
        drop(child.stdin.take());
    }

    relay_output(conn, req, &mut child);
    finish_child(&mut child);
}

/// Read the script's header block, translate it into an HTTP head, and
/// stream the remainder of its stdout as the body.
fn relay_output(conn: &mut Conn, req: &RequestInfo, child: &mut Child) {
    let Some(mut stdout) = child.stdout.take() else {
        conn.send_error(500, "CGI process has no output", Some(req));
        return;
    };

    let mut head_buf = vec![0u8; CGI_HEAD_MAX];
    let mut filled = 0;
    let head_len = loop {
        if let Some(end) = find_head_end(&head_buf[..filled]) {
            break end;
        }
        if filled == head_buf.len() {
            conn.send_error(500, "CGI header block is too large", Some(req));
            return;
        }
        match stdout.read(&mut head_buf[filled..]) {
            Ok(0) | Err(_) => {
                conn.send_error(500, "CGI process did not produce headers", Some(req));
                return;
            }
            Ok(n) => filled += n,
        }
    };

    let headers = parse_cgi_headers(&head_buf[..head_len]);
    let (status, reason) = response_status(&headers);
    conn.status = status;

    // Without a declared length the child's EOF delimits the body.
    let has_length = header_value(&headers, "Content-Length").is_some();
    let wants_keep_alive = header_value(&headers, "Connection")
        .is_some_and(|v| v.eq_ignore_ascii_case("keep-alive"));
    if !has_length || !wants_keep_alive {
        conn.must_close = true;
    }

    let mut head = Head::new(status, &reason).header("Date", cache::http_date_now());
    for (name, value) in &headers {
        if name.eq_ignore_ascii_case("Status") || name.eq_ignore_ascii_case("Connection") {
            continue;
        }
        head = head.header(name, value);
    }
    let head = head.connection(conn.should_keep_alive()).finish();
    if conn.write_bytes(&head).is_err() {
        return;
    }
    if req.method == "HEAD" {
        return;
    }

    if filled > head_len && conn.write_bytes(&head_buf[head_len..filled]).is_err() {
        return;
    }
    let mut chunk = [0u8; IO_CHUNK];
    loop {
        match stdout.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if conn.write_bytes(&chunk[..n]).is_err() {
                    break;
                }
            }
        }
    }
}

fn finish_child(child: &mut Child) {
    // The script may still be running if the relay aborted early.
    let _ = child.kill();
    let _ = child.wait();
}

/// Headers only, no request line. Malformed lines are skipped.
fn parse_cgi_headers(block: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(block);
    let mut headers = Vec::new();
    for line in text.split('\n').map(|l| l.trim_end_matches('\r')) {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                headers.push((name.to_string(), value.trim().to_string()));
            }
        }
    }
    headers
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// `Status` wins, a bare `Location` means 302, anything else is 200.
fn response_status(headers: &[(String, String)]) -> (u16, String) {
    if let Some(status) = header_value(headers, "Status") {
        let code = status
            .split_whitespace()
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(200);
        let reason = status
            .split_once(' ')
            .map_or_else(|| crate::http::status_reason(code).to_string(), |(_, r)| r.to_string());
        return (code, reason);
    }
    if header_value(headers, "Location").is_some() {
        return (302, "Found".to_string());
    }
    (200, "OK".to_string())
}

/// The CGI/1.1 environment block.
fn environment(
    conn: &Conn,
    req: &RequestInfo,
    uri: &str,
    path: &Path,
    path_info: Option<&str>,
) -> Vec<(String, String)> {
    let conf = &conn.state.conf;
    let (_, query) = req.decoded_uri();
    let script_name = match path_info {
        Some(info) => uri.strip_suffix(info).unwrap_or(uri),
        None => uri,
    };

    let mut env: Vec<(String, String)> = vec![
        ("GATEWAY_INTERFACE".into(), "CGI/1.1".into()),
        ("SERVER_PROTOCOL".into(), format!("HTTP/{}", req.version)),
        ("SERVER_SOFTWARE".into(), format!("meerkat/{}", env!("CARGO_PKG_VERSION"))),
        ("SERVER_NAME".into(), conf.auth_realm.clone()),
        ("SERVER_PORT".into(), conn.local.port().to_string()),
        ("REMOTE_ADDR".into(), conn.peer.ip().to_string()),
        ("REMOTE_PORT".into(), conn.peer.port().to_string()),
        ("REQUEST_METHOD".into(), req.method.clone()),
        ("REQUEST_URI".into(), req.uri.clone()),
        ("SCRIPT_NAME".into(), script_name.to_string()),
        ("SCRIPT_FILENAME".into(), path.to_string_lossy().into_owned()),
        ("PATH_TRANSLATED".into(), path.to_string_lossy().into_owned()),
        ("QUERY_STRING".into(), query.unwrap_or_default()),
        ("HTTPS".into(), if conn.is_tls { "on" } else { "off" }.into()),
    ];
    if let Some(root) = &conf.document_root {
        env.push(("DOCUMENT_ROOT".into(), root.to_string_lossy().into_owned()));
    }
    if let Some(info) = path_info {
        env.push(("PATH_INFO".into(), info.to_string()));
    }
    if let Some(user) = &conn.remote_user {
        env.push(("REMOTE_USER".into(), user.clone()));
        env.push(("AUTH_TYPE".into(), "Basic".into()));
    }
    if let Some(ct) = req.header("Content-Type") {
        env.push(("CONTENT_TYPE".into(), ct.to_string()));
    }
    if let Some(cl) = req.header("Content-Length") {
        env.push(("CONTENT_LENGTH".into(), cl.to_string()));
    }
    // Scripts need a sane PATH even under env_clear.
    for inherited in ["PATH", "LD_LIBRARY_PATH", "TMPDIR"] {
        if let Ok(v) = std::env::var(inherited) {
            env.push((inherited.into(), v));
        }
    }
    for (name, value) in &req.headers {
        let key = format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_"));
        env.push((key, value.clone()));
    }
    env
}

//! Server-side include processing
//!
//! A byte-level scanner over `.shtml` documents that copies ordinary
//! content through and interprets `<!--#include -->` and `<!--#exec -->`
//! directives. Output length is unknown in advance, so SSI responses
//! always close the connection.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::handler::resolve;
use crate::http::response::Head;
use crate::http::{cache, mime, RequestInfo};
use crate::server::conn::{Conn, IO_CHUNK};

/// Include nesting ceiling; a self-including document stops here.
const MAX_INCLUDE_DEPTH: u32 = 10;

/// Longest directive tag the scanner will buffer.
const TAG_BUF_SIZE: usize = 8192;

pub fn handle_ssi(conn: &mut Conn, req: &RequestInfo, path: &Path) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            conn.report(Some(req), &format!("cannot open {}: {e}", path.display()));
            conn.send_error(500, "Cannot open SSI document", Some(req));
            return;
        }
    };

    conn.status = 200;
    conn.must_close = true;
    let content_type =
        mime::content_type_for(&path.to_string_lossy(), &conn.state.conf.extra_mime_types);
    let head = Head::status(200)
        .header("Date", cache::http_date_now())
        .header("Content-Type", content_type)
        .connection(false)
        .finish();
    if conn.write_bytes(&head).is_err() {
        return;
    }
    if req.method == "HEAD" {
        return;
    }

    process_file(conn, path, file, 0);
}

/// Scan one document. `path` locates relative includes.
fn process_file(conn: &mut Conn, path: &Path, file: File, depth: u32) {
    if depth > MAX_INCLUDE_DEPTH {
        conn.report(None, &format!("SSI include depth exceeded in {}", path.display()));
        return;
    }

    let mut tag = [0u8; TAG_BUF_SIZE];
    let mut len = 0;
    let mut in_tag = false;

    for byte in BufReader::new(file).bytes() {
        let Ok(ch) = byte else { break };
        if in_tag && ch == b'>' {
            in_tag = false;
            tag[len] = ch;
            len += 1;
            let body = &tag[..len];
            if body.starts_with(b"<!--#") {
                dispatch_directive(conn, path, body, depth);
            } else if conn.write_bytes(body).is_err() {
                return;
            }
            len = 0;
        } else if in_tag {
            // Five bytes in we know whether this is a directive at all.
            if len == 5 && !tag[..5].starts_with(b"<!--#") {
                in_tag = false;
            }
            if len == TAG_BUF_SIZE - 1 {
                conn.report(None, &format!("SSI tag too long in {}", path.display()));
                len = 0;
                in_tag = false;
                continue;
            }
            tag[len] = ch;
            len += 1;
        } else if ch == b'<' {
            in_tag = true;
            if len > 0 && conn.write_bytes(&tag[..len]).is_err() {
                return;
            }
            len = 0;
            tag[len] = ch;
            len += 1;
        } else {
            tag[len] = ch;
            len += 1;
            if len == TAG_BUF_SIZE {
                if conn.write_bytes(&tag[..len]).is_err() {
                    return;
                }
                len = 0;
            }
        }
    }
    if len > 0 {
        let _ = conn.write_bytes(&tag[..len]);
    }
}

fn dispatch_directive(conn: &mut Conn, path: &Path, tag: &[u8], depth: u32) {
    let text = String::from_utf8_lossy(tag);
    if let Some(rest) = text.strip_prefix("<!--#include") {
        do_include(conn, path, rest, depth);
    } else if let Some(rest) = text.strip_prefix("<!--#exec") {
        do_exec(conn, rest);
    } else {
        conn.report(None, &format!("unknown SSI directive: {text}"));
    }
}

/// Resolve the include target:
/// * `virtual="uri"` is relative to the document root
/// * `abspath="path"` is a filesystem path as given
/// * `file="path"` or a bare quoted path is relative to the including
///   document's directory
fn include_target(conn: &Conn, parent: &Path, args: &str) -> Option<PathBuf> {
    let args = args.trim_end_matches("-->").trim();
    let (kind, rest) = if let Some(r) = args.strip_prefix("virtual=") {
        ('v', r)
    } else if let Some(r) = args.strip_prefix("abspath=") {
        ('a', r)
    } else if let Some(r) = args.strip_prefix("file=") {
        ('f', r)
    } else {
        ('f', args)
    };
    let value = unquote(rest)?;
    match kind {
        'v' => {
            let root = conn.state.conf.document_root.as_ref()?;
            Some(PathBuf::from(format!("{}{value}", root.display())))
        }
        'a' => Some(PathBuf::from(value)),
        _ => Some(parent.parent().unwrap_or(Path::new(".")).join(value)),
    }
}

fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let rest = s.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn do_include(conn: &mut Conn, parent: &Path, args: &str, depth: u32) {
    let Some(target) = include_target(conn, parent, args) else {
        conn.report(None, &format!("bad SSI include: {}", args.trim()));
        return;
    };
    let file = match File::open(&target) {
        Ok(f) => f,
        Err(e) => {
            conn.report(None, &format!("cannot open SSI include {}: {e}", target.display()));
            return;
        }
    };
    if resolve::is_ssi(&conn.state.conf, &target) {
        // Nested documents are themselves scanned for directives.
        process_file(conn, &target, file, depth + 1);
    } else {
        stream_raw(conn, file);
    }
}

fn stream_raw(conn: &mut Conn, file: File) {
    let mut reader = BufReader::new(file);
    let mut chunk = [0u8; IO_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if conn.write_bytes(&chunk[..n]).is_err() {
                    break;
                }
            }
        }
    }
}

/// `<!--#exec "cmd" -->`: run through the shell and inline the stdout.
/// Disabled configurations drop the directive without a trace.
fn do_exec(conn: &mut Conn, args: &str) {
    if !conn.state.conf.enable_ssi_exec {
        return;
    }
    let Some(cmd) = unquote(args.trim_end_matches("-->")) else {
        conn.report(None, &format!("bad SSI exec: {}", args.trim()));
        return;
    };
    let child = Command::new("sh")
        .arg("-c")
        .arg(&cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();
    match child {
        Ok(mut child) => {
            if let Some(stdout) = child.stdout.take() {
                let mut reader = BufReader::new(stdout);
                let mut chunk = [0u8; IO_CHUNK];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if conn.write_bytes(&chunk[..n]).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            let _ = child.wait();
        }
        Err(e) => conn.report(None, &format!("cannot spawn SSI exec '{cmd}': {e}")),
    }
}

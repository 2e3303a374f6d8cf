//! WebDAV responders: PROPFIND, MKCOL, PUT, DELETE
//!
//! Enough of RFC 4918 for remote file management: property listings
//! with Depth 0/1, collection creation, streamed uploads with resume,
//! and recursive deletion. Locking is not implemented; an undeletable
//! resource reports 423 as the nearest honest status.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom};
use std::path::Path;

use crate::handler::resolve::{self, FileMeta};
use crate::http::buffer::RecvBuffer;
use crate::http::range::parse_content_range_start;
use crate::http::response::Head;
use crate::http::{cache, RequestInfo};
use crate::server::conn::Conn;

/// One `<d:response>` element for the multistatus body.
fn prop_response(href: &str, meta: &FileMeta) -> String {
    let resourcetype = if meta.is_dir { "<d:collection/>" } else { "" };
    format!(
        "<d:response>\
         <d:href>{href}</d:href>\
         <d:propstat><d:prop>\
         <d:resourcetype>{resourcetype}</d:resourcetype>\
         <d:getcontentlength>{}</d:getcontentlength>\
         <d:getlastmodified>{}</d:getlastmodified>\
         </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat>\
         </d:response>",
        meta.size,
        cache::format_http_date(meta.modified),
    )
}

fn encode_href(uri: &str) -> String {
    uri.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// PROPFIND on an existing resource. Children are included only for
/// directories, only when listings are enabled, and only when the Depth
/// header asks for them.
pub fn handle_propfind(conn: &mut Conn, req: &RequestInfo, uri: &str, path: &Path, meta: &FileMeta) {
    let depth = req.header("Depth");
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <d:multistatus xmlns:d='DAV:'>",
    );
    body.push_str(&prop_response(&encode_href(uri), meta));

    if meta.is_dir && conn.state.conf.enable_directory_listing && depth != Some("0") {
        if let Ok(read_dir) = fs::read_dir(path) {
            let base = if uri.ends_with('/') {
                uri.to_string()
            } else {
                format!("{uri}/")
            };
            for dent in read_dir.flatten() {
                let name = dent.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || resolve::is_hidden(&conn.state.conf, &dent.path()) {
                    continue;
                }
                if let Some(child) = resolve::stat(&dent.path()) {
                    let href = encode_href(&format!("{base}{name}"));
                    body.push_str(&prop_response(&href, &child));
                }
            }
        }
    }
    body.push_str("</d:multistatus>");

    // Body length is not declared; the close delimits it.
    conn.status = 207;
    conn.must_close = true;
    let head = Head::new(207, "Multi-Status")
        .header("Date", cache::http_date_now())
        .header("Content-Type", "text/xml; charset=utf-8")
        .connection(false)
        .finish();
    if conn.write_bytes(&head).is_ok() {
        let _ = conn.write_bytes(body.as_bytes());
    }
}

/// MKCOL: create one collection. A request body is refused, an existing
/// target is a method error, a missing parent a conflict.
pub fn handle_mkcol(conn: &mut Conn, req: &RequestInfo, path: &Path) {
    if conn.content_len.is_none_or(|l| l > 0) {
        conn.send_error(415, "MKCOL request body is not supported", Some(req));
        return;
    }
    match fs::create_dir(path) {
        Ok(()) => send_empty(conn, 201),
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::AlreadyExists => 405,
                ErrorKind::NotFound => 409,
                ErrorKind::PermissionDenied => 403,
                _ => 500,
            };
            conn.send_error(status, &format!("MKCOL failed: {e}"), Some(req));
        }
    }
}

/// PUT: store the request body, creating missing parent directories.
/// 201 for a new resource, 200 for an overwrite. A Content-Range start
/// offset turns the upload into a resume.
pub fn handle_put(conn: &mut Conn, buf: &mut RecvBuffer, req: &RequestInfo, uri: &str, path: &Path) {
    let existed = resolve::stat(path).is_some();
    let status = if existed { 200 } else { 201 };

    // A trailing slash targets the directory itself.
    if uri.ends_with('/') {
        if let Err(e) = fs::create_dir_all(path) {
            conn.report(Some(req), &format!("cannot create {}: {e}", path.display()));
            conn.send_error(500, "Cannot create directory", Some(req));
            return;
        }
        send_empty(conn, status);
        return;
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            conn.report(Some(req), &format!("cannot create {}: {e}", parent.display()));
            conn.send_error(500, "Cannot create parent directories", Some(req));
            return;
        }
    }

    let resume_at = req.header("Content-Range").and_then(parse_content_range_start);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(resume_at.is_none())
        .open(path);
    let mut file = match file {
        Ok(f) => f,
        Err(e) => {
            conn.report(Some(req), &format!("cannot open {}: {e}", path.display()));
            conn.send_error(500, "Cannot open file for writing", Some(req));
            return;
        }
    };
    if let Some(offset) = resume_at {
        if file.seek(SeekFrom::Start(offset)).is_err() {
            conn.send_error(500, "Cannot seek to upload offset", Some(req));
            return;
        }
    }

    // forward_body answers 411/417/500 itself on failure.
    if conn.forward_body(buf, req, &mut file) {
        send_empty(conn, status);
    }
}

/// DELETE: remove a file, or a directory tree recursively.
pub fn handle_delete(conn: &mut Conn, req: &RequestInfo, path: &Path) {
    let Some(meta) = resolve::stat(path) else {
        conn.send_error(404, "File not found", Some(req));
        return;
    };
    let result = if meta.is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => send_empty(conn, 204),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            conn.send_error(404, "File not found", Some(req));
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            conn.send_error(423, "Resource cannot be removed", Some(req));
        }
        Err(e) => {
            conn.report(Some(req), &format!("cannot delete {}: {e}", path.display()));
            conn.send_error(500, "Cannot delete resource", Some(req));
        }
    }
}

fn send_empty(conn: &mut Conn, status: u16) {
    conn.status = status;
    let head = Head::status(status)
        .header("Date", cache::http_date_now())
        .header("Content-Length", 0)
        .connection(conn.should_keep_alive())
        .finish();
    let _ = conn.write_bytes(&head);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_prop_response_marks_collections() {
        let meta = FileMeta {
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
            is_dir: true,
            gzipped: false,
        };
        let xml = prop_response("/docs/", &meta);
        assert!(xml.contains("<d:collection/>"));
        assert!(xml.contains("<d:href>/docs/</d:href>"));

        let file = FileMeta { is_dir: false, size: 42, ..meta };
        let xml = prop_response("/a.txt", &file);
        assert!(!xml.contains("collection"));
        assert!(xml.contains("<d:getcontentlength>42</d:getcontentlength>"));
    }

    #[test]
    fn test_encode_href_preserves_slashes() {
        assert_eq!(encode_href("/a b/c.txt"), "/a%20b/c.txt");
        assert_eq!(encode_href("/plain/path"), "/plain/path");
    }
}

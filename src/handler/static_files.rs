//! Static file serving module
//!
//! Streams files from disk with range, precompressed-sibling and
//! conditional-request support. Bodies never pass through memory whole;
//! everything is copied through a fixed chunk buffer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::handler::resolve::FileMeta;
use crate::http::range::{parse_range_header, ByteRange};
use crate::http::response::Head;
use crate::http::{cache, mime, RequestInfo};
use crate::server::conn::{Conn, IO_CHUNK};

/// Serve a regular file for GET or HEAD.
pub fn handle_file(conn: &mut Conn, req: &RequestInfo, path: &Path, meta: &FileMeta) {
    // Range on a precompressed sibling cannot be honored: offsets would
    // address compressed bytes.
    if meta.gzipped && req.header("Range").is_some() {
        conn.send_error(501, "Range requests on compressed content are not supported", Some(req));
        return;
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            conn.report(Some(req), &format!("cannot open {}: {e}", path.display()));
            conn.send_error(500, "Cannot open file", Some(req));
            return;
        }
    };

    let range = if meta.gzipped {
        None
    } else {
        parse_range_header(req.header("Range"), meta.size)
    };

    let (status, body_len) = match range {
        Some(r) => (206, r.len()),
        None => (200, meta.size),
    };
    conn.status = status;

    // MIME type follows the requested name, not the .gz sibling.
    let path_str = path.to_string_lossy();
    let mime_name = path_str.strip_suffix(".gz").unwrap_or(&path_str);
    let content_type = mime::content_type_for(mime_name, &conn.state.conf.extra_mime_types);

    let mut head = Head::status(status)
        .header("Date", cache::http_date_now())
        .header("Last-Modified", cache::format_http_date(meta.modified))
        .header("ETag", cache::generate_etag(meta.modified, meta.size))
        .header("Content-Type", content_type)
        .header("Content-Length", body_len)
        .header("Accept-Ranges", "bytes");
    if meta.gzipped {
        head = head.header("Content-Encoding", "gzip");
    }
    if let Some(r) = range {
        head = head.header("Content-Range", r.content_range(meta.size));
    }
    let head = head.connection(conn.should_keep_alive()).finish();
    if conn.write_bytes(&head).is_err() {
        return;
    }

    if req.method != "HEAD" {
        stream_file(conn, &mut file, range, meta.size);
    }
}

/// Copy the selected span of `file` to the client.
fn stream_file(conn: &mut Conn, file: &mut File, range: Option<ByteRange>, size: u64) {
    let (start, mut remaining) = match range {
        Some(r) => (r.start, r.len()),
        None => (0, size),
    };
    if start > 0 && file.seek(SeekFrom::Start(start)).is_err() {
        conn.must_close = true;
        return;
    }

    let mut chunk = [0u8; IO_CHUNK];
    while remaining > 0 {
        let want = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = match file.read(&mut chunk[..want]) {
            Ok(0) => {
                // File shrank under us; the framing is now wrong.
                conn.must_close = true;
                return;
            }
            Ok(n) => n,
            Err(_) => {
                conn.must_close = true;
                return;
            }
        };
        if conn.write_bytes(&chunk[..n]).is_err() {
            return;
        }
        remaining -= n as u64;
    }
}

//! Generated directory listings
//!
//! HTML index pages for directory URIs when no index file exists and
//! listings are enabled. The page length is unknown up front, so it is
//! sent chunked and the connection closes afterwards.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::handler::resolve;
use crate::http::response::{chunk, Head, LAST_CHUNK};
use crate::http::{cache, RequestInfo};
use crate::server::conn::Conn;

struct Entry {
    name: String,
    is_dir: bool,
    size: u64,
    modified: SystemTime,
}

/// Sort column and direction from the query string: first char picks the
/// column (`n`ame, `s`ize, `d`ate), a second `d` flips to descending.
fn sort_spec(query: Option<&str>) -> (char, bool) {
    let q = query.unwrap_or("");
    let mut chars = q.chars();
    let column = match chars.next() {
        Some(c @ ('n' | 's' | 'd')) => c,
        _ => 'n',
    };
    let descending = chars.next() == Some('d');
    (column, descending)
}

fn sort_entries(entries: &mut [Entry], column: char, descending: bool) {
    entries.sort_by(|a, b| {
        // Directories group before files regardless of column.
        let ord = b.is_dir.cmp(&a.is_dir).then_with(|| match column {
            's' => a.size.cmp(&b.size),
            'd' => a.modified.cmp(&b.modified),
            _ => a.name.cmp(&b.name),
        });
        if descending && a.is_dir == b.is_dir {
            ord.reverse()
        } else {
            ord
        }
    });
}

#[allow(clippy::cast_precision_loss)]
fn display_size(e: &Entry) -> String {
    if e.is_dir {
        return "[DIRECTORY]".to_string();
    }
    if e.size < 1024 {
        format!("{}b", e.size)
    } else if e.size < 1024 * 1024 {
        format!("{:.1}k", e.size as f64 / 1024.0)
    } else if e.size < 1024 * 1024 * 1024 {
        format!("{:.1}M", e.size as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}G", e.size as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn display_time(t: SystemTime) -> String {
    let dt: DateTime<Local> = t.into();
    dt.format("%d-%b-%Y %H:%M").to_string()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Send the listing for `dir` at `uri` (which ends with a slash).
pub fn handle_listing(conn: &mut Conn, req: &RequestInfo, uri: &str, dir: &Path) {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            conn.report(Some(req), &format!("cannot list {}: {e}", dir.display()));
            conn.send_error(500, "Cannot open directory", Some(req));
            return;
        }
    };

    let mut entries: Vec<Entry> = Vec::new();
    for dent in read_dir.flatten() {
        let name = dent.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if resolve::is_hidden(&conn.state.conf, &dent.path()) {
            continue;
        }
        let Ok(md) = dent.metadata() else { continue };
        entries.push(Entry {
            name,
            is_dir: md.is_dir(),
            size: md.len(),
            modified: md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    let (column, descending) = sort_spec(req.decoded_uri().1.as_deref());
    sort_entries(&mut entries, column, descending);

    conn.status = 200;
    conn.must_close = true;
    let head = Head::status(200)
        .header("Date", cache::http_date_now())
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Transfer-Encoding", "chunked")
        .connection(false)
        .finish();
    if conn.write_bytes(&head).is_err() {
        return;
    }
    if req.method == "HEAD" {
        return;
    }

    let esc_uri = html_escape(uri);
    let mut page = format!(
        "<html><head><title>Index of {esc_uri}</title>\
         <style>th {{text-align: left;}}</style></head>\
         <body><h1>Index of {esc_uri}</h1><pre><table cellpadding=\"0\">\
         <tr><th><a href=\"?n{}\">Name</a></th>\
         <th><a href=\"?d{}\">Modified</a></th>\
         <th><a href=\"?s{}\">Size</a></th></tr>\
         <tr><td><a href=\"..\">..</a></td><td>&nbsp;</td><td>&nbsp;</td></tr>",
        toggle(column, descending, 'n'),
        toggle(column, descending, 'd'),
        toggle(column, descending, 's'),
    );
    if conn.write_bytes(&chunk(page.as_bytes())).is_err() {
        return;
    }

    for e in &entries {
        let href = urlencoding::encode(&e.name);
        let slash = if e.is_dir { "/" } else { "" };
        page = format!(
            "<tr><td><a href=\"{href}{slash}\">{}{slash}</a></td><td>{}</td><td>{}</td></tr>",
            html_escape(&e.name),
            display_time(e.modified),
            display_size(e),
        );
        if conn.write_bytes(&chunk(page.as_bytes())).is_err() {
            return;
        }
    }

    let _ = conn.write_bytes(&chunk(b"</table></pre></body></html>"));
    let _ = conn.write_bytes(LAST_CHUNK);
}

/// Flip the sort direction link for the active column only.
fn toggle(column: char, descending: bool, link: char) -> &'static str {
    if column == link && !descending {
        "d"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(name: &str, is_dir: bool, size: u64, secs: u64) -> Entry {
        Entry {
            name: name.to_string(),
            is_dir,
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_sort_spec_defaults() {
        assert_eq!(sort_spec(None), ('n', false));
        assert_eq!(sort_spec(Some("")), ('n', false));
        assert_eq!(sort_spec(Some("sd")), ('s', true));
        assert_eq!(sort_spec(Some("d")), ('d', false));
        assert_eq!(sort_spec(Some("zz")), ('n', false));
    }

    #[test]
    fn test_directories_first() {
        let mut es = vec![
            entry("zz.txt", false, 1, 0),
            entry("aa", true, 0, 0),
            entry("bb.txt", false, 2, 0),
        ];
        sort_entries(&mut es, 'n', false);
        assert_eq!(es[0].name, "aa");
        assert_eq!(es[1].name, "bb.txt");
        assert_eq!(es[2].name, "zz.txt");
    }

    #[test]
    fn test_size_sort_descending() {
        let mut es = vec![
            entry("a", false, 10, 0),
            entry("b", false, 30, 0),
            entry("c", false, 20, 0),
        ];
        sort_entries(&mut es, 's', true);
        assert_eq!(es[0].size, 30);
        assert_eq!(es[2].size, 10);
    }

    #[test]
    fn test_display_size() {
        assert_eq!(display_size(&entry("x", false, 512, 0)), "512b");
        assert_eq!(display_size(&entry("x", false, 2048, 0)), "2.0k");
        assert_eq!(display_size(&entry("x", true, 0, 0)), "[DIRECTORY]");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a&b>"), "&lt;a&amp;b&gt;");
    }
}

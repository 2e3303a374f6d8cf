//! HTTP request head parsing
//!
//! Turns a raw request head (everything up to and including the blank line)
//! into an owned [`RequestInfo`]. Parsing is deliberately tolerant about
//! line endings and header whitespace, and strict about the request line.

/// Methods the engine understands. Anything else is still parsed and routed
/// (an embedding hook may claim it); the router answers 404/501 for methods
/// it cannot serve itself.
pub const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "PROPFIND", "MKCOL",
];

/// Most headers one request may carry.
const MAX_HEADERS: usize = 64;

/// A parsed request head with owned strings.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: String,
    /// Raw request target, query string still attached.
    pub uri: String,
    /// "1.0" or "1.1".
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl RequestInfo {
    /// Parse a complete head. `head` must end at the blank line located by
    /// [`find_head_end`](crate::http::buffer::find_head_end).
    ///
    /// Returns `None` for anything that is not a well-formed HTTP/1.x
    /// request line followed by well-formed headers.
    pub fn parse(head: &[u8]) -> Option<RequestInfo> {
        // Control bytes other than line endings and tabs mean this is
        // not an HTTP head at all (a stray TLS record, say).
        if head
            .iter()
            .any(|&b| b < 0x20 && b != b'\r' && b != b'\n' && b != b'\t')
        {
            return None;
        }
        let text = std::str::from_utf8(head).ok()?;
        let mut lines = text.split('\n').map(|l| l.trim_end_matches('\r'));

        // Skip leading blank lines, which some clients emit between
        // pipelined requests.
        let request_line = lines.by_ref().find(|l| !l.is_empty())?;

        let mut parts = request_line.split_ascii_whitespace();
        let method = parts.next()?;
        let uri = parts.next()?;
        let proto = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        // Only origin-form targets and the bare `*` are served;
        // absolute-form (`GET http://h/p`) is for proxies.
        if !uri.starts_with('/') && uri != "*" {
            return None;
        }
        let version = proto.strip_prefix("HTTP/")?;
        if version != "1.0" && version != "1.1" {
            // The caller distinguishes "not HTTP at all" from "wrong
            // version" via is_http_version below, so accept any x.y here.
            if version.len() != 3 || !version.starts_with(|c: char| c.is_ascii_digit()) {
                return None;
            }
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if headers.len() == MAX_HEADERS {
                return None;
            }
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            headers.push((name.to_string(), value.trim().to_string()));
        }

        Some(RequestInfo {
            method: method.to_string(),
            uri: uri.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    /// Case-insensitive header lookup, first occurrence.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// HTTP version is one the engine can serve.
    pub fn is_supported_version(&self) -> bool {
        self.version == "1.0" || self.version == "1.1"
    }

    /// Declared body length: the `Content-Length` header when present
    /// and numeric. Without the header, PUT and POST are indeterminate
    /// (`None`); every other method defaults to an empty body.
    pub fn content_length(&self) -> Option<u64> {
        if let Some(v) = self.header("Content-Length") {
            return v.trim().parse::<u64>().ok();
        }
        if self.method == "PUT" || self.method == "POST" {
            None
        } else {
            Some(0)
        }
    }

    /// The URI with its query string split off and percent-decoded.
    /// `+` is left alone: it is only space in form bodies, not in paths.
    pub fn decoded_uri(&self) -> (String, Option<String>) {
        let (path, query) = match self.uri.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (self.uri.as_str(), None),
        };
        (percent_decode(path), query)
    }

    pub fn is_write_method(&self) -> bool {
        matches!(self.method.as_str(), "PUT" | "DELETE" | "MKCOL")
    }
}

/// Decode `%XX` escapes. Malformed escapes pass through verbatim.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Collapse a decoded URI path into canonical form: fold duplicate
/// slashes, drop `.` segments, resolve `..` without ever escaping the
/// root. A trailing slash is preserved.
pub fn canonicalize_uri(uri: &str) -> String {
    let trailing_slash = uri.len() > 1 && uri.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for seg in uri.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut out = String::from("/");
    out.push_str(&segments.join("/"));
    if trailing_slash && out.len() > 1 {
        out.push('/');
    }
    out
}

//! HTTP Range request parsing module
//!
//! Single-range `bytes=` parsing for resumable downloads. A header the
//! parser cannot honor is ignored and the full representation is served;
//! this engine never answers 416.

/// A satisfiable byte range, both ends inclusive and already clamped to
/// the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero by construction.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a file of `file_size` bytes.
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

/// Parse a `Range` request header (single range, bytes unit).
///
/// Supported forms:
/// - `bytes=start-end`
/// - `bytes=start-` (from start to end of file)
///
/// Anything else, including multi-ranges, suffix ranges, and ranges whose
/// start lies at or past the end of the file, yields `None` and the caller
/// serves the whole file.
///
/// # Examples
/// ```
/// use meerkat::http::range::parse_range_header;
///
/// let r = parse_range_header(Some("bytes=0-99"), 1000).unwrap();
/// assert_eq!((r.start, r.end), (0, 99));
///
/// assert!(parse_range_header(Some("bytes=2000-"), 1000).is_none());
/// assert!(parse_range_header(None, 1000).is_none());
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> Option<ByteRange> {
    let header = range_header?.strip_prefix("bytes=")?;
    if header.contains(',') {
        return None;
    }

    let (start_str, end_str) = header.split_once('-')?;
    let start = start_str.trim().parse::<u64>().ok()?;
    if start >= file_size {
        return None;
    }

    let end = match end_str.trim() {
        "" => file_size - 1,
        s => s.parse::<u64>().ok()?.min(file_size - 1),
    };
    if start > end {
        return None;
    }

    Some(ByteRange { start, end })
}

/// Extract the upload offset from a `Content-Range` header on PUT.
///
/// Accepts both the standard `bytes start-end/total` form and the lax
/// `bytes=start-end` form some upload clients send.
pub fn parse_content_range_start(header: &str) -> Option<u64> {
    let rest = header.trim().strip_prefix("bytes")?;
    let rest = rest.strip_prefix('=').or_else(|| rest.strip_prefix(' '))?;
    let start_str = rest.split(['-', '/']).next()?;
    start_str.trim().parse::<u64>().ok()
}

//! HTTP cache control module
//!
//! Provides `ETag` generation, HTTP date formatting and conditional
//! request handling for static files.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Generate a weak-by-construction `ETag` from file metadata.
///
/// The tag is `"mtime.size"` with the modification time in hex seconds,
/// so it changes whenever the file is rewritten or resized without the
/// server ever reading the content.
pub fn generate_etag(modified: SystemTime, size: u64) -> String {
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    format!("\"{secs:x}.{size}\"")
}

/// Format a timestamp as an RFC 1123 HTTP date, e.g.
/// `Thu, 01 Jan 1970 00:00:00 GMT`.
pub fn format_http_date(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date header value. Only the RFC 1123 form is accepted;
/// anything else is treated as absent.
pub fn parse_http_date(s: &str) -> Option<SystemTime> {
    let dt = DateTime::parse_from_rfc2822(s).ok()?;
    Some(
        UNIX_EPOCH
            + Duration::from_secs(u64::try_from(dt.with_timezone(&Utc).timestamp()).ok()?),
    )
}

/// Check if the client's `If-None-Match` header matches the server `ETag`.
///
/// Handles a comma-separated list and the `*` wildcard; comparison is
/// case-insensitive.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client| {
        client
            .split(',')
            .any(|e| e.trim().eq_ignore_ascii_case(etag) || e.trim() == "*")
    })
}

/// Decide whether a conditional GET can be answered with 304.
///
/// `If-None-Match` is consulted first; failing that, `If-Modified-Since`
/// succeeds when the file has not been modified after the given date.
pub fn is_not_modified(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    modified: SystemTime,
    size: u64,
) -> bool {
    let etag = generate_etag(modified, size);
    if check_etag_match(if_none_match, &etag) {
        return true;
    }
    if_modified_since
        .and_then(parse_http_date)
        .is_some_and(|since| {
            // Header dates have whole-second resolution.
            let mtime = modified
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs();
            let since = since
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs();
            mtime <= since
        })
}

/// Current time as an HTTP date, for the `Date` response header.
pub fn http_date_now() -> String {
    format_http_date(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_generate_etag_format() {
        assert_eq!(generate_etag(t(0x5f), 1234), "\"5f.1234\"");
    }

    #[test]
    fn test_etag_changes_with_metadata() {
        let a = generate_etag(t(100), 10);
        assert_ne!(a, generate_etag(t(101), 10));
        assert_ne!(a, generate_etag(t(100), 11));
        assert_eq!(a, generate_etag(t(100), 10));
    }

    #[test]
    fn test_http_date_round_trip() {
        let now = t(1_700_000_000);
        let s = format_http_date(now);
        assert!(s.ends_with("GMT"));
        assert_eq!(parse_http_date(&s), Some(now));
    }

    #[test]
    fn test_parse_http_date_rejects_garbage() {
        assert!(parse_http_date("yesterday").is_none());
        assert!(parse_http_date("").is_none());
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"5f.1234\"";
        assert!(check_etag_match(Some("\"5f.1234\""), etag));
        assert!(check_etag_match(Some("\"other\", \"5F.1234\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_not_modified_by_etag() {
        let etag = generate_etag(t(100), 10);
        assert!(is_not_modified(Some(&etag), None, t(100), 10));
        assert!(!is_not_modified(Some("\"nope\""), None, t(100), 10));
    }

    #[test]
    fn test_not_modified_by_date() {
        let since = format_http_date(t(200));
        assert!(is_not_modified(None, Some(&since), t(200), 10));
        assert!(is_not_modified(None, Some(&since), t(150), 10));
        assert!(!is_not_modified(None, Some(&since), t(250), 10));
    }
}

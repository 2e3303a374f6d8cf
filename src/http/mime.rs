//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension.
//! Configured `extra_mime_types` entries take precedence over the builtin
//! table; unknown extensions fall back to plain text.

/// Get MIME Content-Type based on file extension
///
/// # Examples
/// ```
/// use meerkat::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("html")), "text/html");
/// assert_eq!(get_content_type(Some("mp4")), "video/mp4");
/// assert_eq!(get_content_type(None), "text/plain; charset=utf-8");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    let lower = extension.map(str::to_ascii_lowercase);
    match lower.as_deref() {
        // Text
        Some("html" | "htm" | "shtml" | "shtm") => "text/html",
        Some("css") => "text/css",
        Some("xml" | "xslt" | "xsl") => "text/xml",

        // JavaScript/WASM
        Some("js" | "mjs") => "application/x-javascript",
        Some("json") => "application/json",
        Some("wasm") => "application/wasm",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",

        // Video
        Some("mp4") => "video/mp4",
        Some("m4v") => "video/x-m4v",
        Some("webm") => "video/webm",
        Some("mpg" | "mpeg") => "video/mpeg",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("asf") => "video/x-ms-asf",

        // Audio
        Some("mp3") => "audio/x-mp3",
        Some("wav") => "audio/x-wav",
        Some("mid") => "audio/mid",
        Some("m3u") => "audio/x-mpegurl",
        Some("ogg") => "application/ogg",
        Some("ra" | "ram") => "audio/x-pn-realaudio",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "application/x-font-ttf",
        Some("otf") => "font/otf",

        // Documents and archives
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("xls") => "application/excel",
        Some("rtf") => "application/rtf",
        Some("exe") => "application/octet-stream",
        Some("zip") => "application/x-zip-compressed",
        Some("gz" | "gzip") => "application/x-gunzip",
        Some("tgz") => "application/x-tar-gz",
        Some("tar") => "application/x-tar",
        Some("rar") => "application/x-rar-compressed",
        Some("torrent") => "application/x-bittorrent",
        Some("swf") => "application/x-shockwave-flash",

        // Default
        _ => "text/plain; charset=utf-8",
    }
}

/// Extract the extension from a path, if any.
pub fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit(['/', '\\']).next()?;
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Resolve the Content-Type for `path`, consulting configured extra
/// mappings first.
pub fn content_type_for<'a>(path: &str, extra: &'a [(String, String)]) -> &'a str {
    let ext = extension_of(path);
    if let Some(ext) = ext {
        if let Some((_, mime)) = extra.iter().find(|(e, _)| e.eq_ignore_ascii_case(ext)) {
            return mime.as_str();
        }
    }
    get_content_type(ext)
}

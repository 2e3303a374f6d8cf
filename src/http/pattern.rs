//! Glob pattern matching for URIs and file paths
//!
//! The dialect used throughout the configuration (`cgi_pattern`,
//! `ssi_pattern`, `hide_files_patterns`, URL rewrites):
//!
//! * `*`  matches any run of characters except `/`
//! * `**` matches any run of characters including `/`
//! * `?`  matches exactly one character
//! * `$`  anchors the match to the end of the input
//! * `|`  separates alternative patterns; the first that matches wins
//!
//! Matching is case-insensitive. A successful match returns the number of
//! input characters consumed, which callers use for prefix rewrites.

/// Match a single pattern (no `|` alternation) against the start of `text`.
///
/// Returns `Some(consumed)` on success, where `consumed` is the number of
/// bytes of `text` covered by the pattern.
fn match_one(pattern: &[u8], text: &[u8]) -> Option<usize> {
    let mut pi = 0;
    let mut ti = 0;
    while pi < pattern.len() {
        match pattern[pi] {
            b'?' if ti < text.len() => {
                pi += 1;
                ti += 1;
            }
            b'$' => {
                return if ti == text.len() { Some(ti) } else { None };
            }
            b'*' => {
                pi += 1;
                let cross_slash = pi < pattern.len() && pattern[pi] == b'*';
                if cross_slash {
                    pi += 1;
                }
                if pi == pattern.len() {
                    // Trailing star: swallow the rest (or up to the next slash).
                    let stop = if cross_slash {
                        text.len()
                    } else {
                        text[ti..]
                            .iter()
                            .position(|&c| c == b'/')
                            .map_or(text.len(), |p| ti + p)
                    };
                    return Some(stop);
                }
                let limit = if cross_slash {
                    text.len() - ti
                } else {
                    text[ti..]
                        .iter()
                        .position(|&c| c == b'/')
                        .unwrap_or(text.len() - ti)
                };
                // Longest match first so `$` anchors still work.
                for take in (0..=limit).rev() {
                    if let Some(n) = match_one(&pattern[pi..], &text[ti + take..]) {
                        return Some(ti + take + n);
                    }
                }
                return None;
            }
            c if ti < text.len() && c.to_ascii_lowercase() == text[ti].to_ascii_lowercase() => {
                pi += 1;
                ti += 1;
            }
            _ => return None,
        }
    }
    Some(ti)
}

/// Match `pattern` (possibly `|`-separated alternatives) against `text`.
///
/// Returns the number of bytes consumed by the first matching alternative,
/// or `None` if no alternative matches.
pub fn match_prefix(pattern: &str, text: &str) -> Option<usize> {
    pattern
        .split('|')
        .find_map(|alt| match_one(alt.as_bytes(), text.as_bytes()))
}

/// True when `pattern` matches `text` in full (anchored implicitly at the
/// end, as configuration patterns conventionally are via `$`).
pub fn matches(pattern: &str, text: &str) -> bool {
    match_prefix(pattern, text).is_some()
}

//! URI to filesystem resolution
//!
//! Turns a canonicalized URI into a concrete path using the rewrite
//! table and document root, then probes the filesystem: the literal
//! path first, a precompressed `.gz` sibling next, and finally the
//! CGI `PATH_INFO` walk that strips trailing segments until a script
//! is found.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::http::pattern;
use crate::server::state::RuntimeConfig;

/// Longest filesystem path the resolver will construct.
const MAX_PATH: usize = 4096;

/// What `stat` said about a resolved target.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
    /// Resolution landed on a `.gz` sibling of the requested path.
    pub gzipped: bool,
}

pub fn stat(path: &Path) -> Option<FileMeta> {
    let md = std::fs::metadata(path).ok()?;
    Some(FileMeta {
        size: md.len(),
        modified: md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        is_dir: md.is_dir(),
        gzipped: false,
    })
}

/// Outcome of resolving a URI against the web space.
#[derive(Debug)]
pub struct Resolution {
    pub path: PathBuf,
    pub meta: Option<FileMeta>,
    /// Trailing URI segments behind a CGI script, `/extra/path` form.
    pub path_info: Option<String>,
}

/// Map `uri` to a filesystem path. Returns `None` only when no document
/// root is configured and no rewrite matches.
pub fn resolve(conf: &RuntimeConfig, uri: &str, accept_gzip: bool) -> Option<Resolution> {
    let path_str = rewrite_target(conf, uri)?;

    if let Some(meta) = stat(Path::new(&path_str)) {
        return Some(Resolution {
            path: PathBuf::from(path_str),
            meta: Some(meta),
            path_info: None,
        });
    }

    // A missing file may exist as a precompressed sibling.
    if accept_gzip {
        let gz = format!("{path_str}.gz");
        if let Some(meta) = stat(Path::new(&gz)) {
            if !meta.is_dir {
                return Some(Resolution {
                    path: PathBuf::from(gz),
                    meta: Some(FileMeta {
                        gzipped: true,
                        ..meta
                    }),
                    path_info: None,
                });
            }
        }
    }

    // PATH_INFO probe: /script.cgi/extra/path names script.cgi.
    if let Some((script, info, meta)) = split_path_info(conf, &path_str) {
        return Some(Resolution {
            path: PathBuf::from(script),
            meta: Some(meta),
            path_info: Some(info),
        });
    }

    Some(Resolution {
        path: PathBuf::from(path_str),
        meta: None,
        path_info: None,
    })
}

/// Apply the first matching rewrite, falling back to the document root.
fn rewrite_target(conf: &RuntimeConfig, uri: &str) -> Option<String> {
    for (prefix, dir) in &conf.rewrites {
        if let Some(consumed) = pattern::match_prefix(prefix, uri) {
            let path = format!("{dir}{}", &uri[consumed..]);
            return if path.len() > MAX_PATH { None } else { Some(path) };
        }
    }
    let root = conf.document_root.as_ref()?;
    let path = format!("{}{uri}", root.display());
    if path.len() > MAX_PATH {
        None
    } else {
        Some(path)
    }
}

/// Strip trailing segments until the remaining prefix matches the CGI
/// pattern and exists as a regular file. The longest viable prefix wins.
fn split_path_info(
    conf: &RuntimeConfig,
    path_str: &str,
) -> Option<(String, String, FileMeta)> {
    let mut cut = path_str.len();
    while let Some(sep) = path_str[..cut].rfind('/') {
        if sep == 0 {
            break;
        }
        let prefix = &path_str[..sep];
        if pattern::matches(&conf.cgi_pattern, prefix) {
            if let Some(meta) = stat(Path::new(prefix)) {
                if !meta.is_dir {
                    return Some((prefix.to_string(), path_str[sep..].to_string(), meta));
                }
            }
        }
        cut = sep;
    }
    None
}

/// Paths matching a hide pattern, and the auth files themselves, are
/// served to nobody.
pub fn is_hidden(conf: &RuntimeConfig, path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    if let Some(patterns) = &conf.hide_patterns {
        if pattern::matches(patterns, &path_str) {
            return true;
        }
    }
    [&conf.global_auth_file, &conf.put_delete_auth_file]
        .iter()
        .any(|f| f.as_deref() == Some(path))
}

/// Search a directory for the first configured index file. Candidates
/// that would overflow the path limit are skipped, not errors.
pub fn find_index(conf: &RuntimeConfig, dir: &Path) -> Option<(PathBuf, FileMeta)> {
    let dir_len = dir.as_os_str().len();
    for candidate in &conf.index_files {
        if dir_len + 1 + candidate.len() > MAX_PATH {
            continue;
        }
        let path = dir.join(candidate);
        if let Some(meta) = stat(&path) {
            if !meta.is_dir {
                return Some((path, meta));
            }
        }
    }
    None
}

pub fn is_cgi(conf: &RuntimeConfig, path: &Path) -> bool {
    pattern::matches(&conf.cgi_pattern, &path.to_string_lossy())
}

pub fn is_ssi(conf: &RuntimeConfig, path: &Path) -> bool {
    pattern::matches(&conf.ssi_pattern, &path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;

    fn conf_with_root(root: &Path) -> RuntimeConfig {
        let mut cfg = Config::default();
        cfg.web.document_root = root.to_string_lossy().into_owned();
        RuntimeConfig::from_config(&cfg).expect("conf")
    }

    #[test]
    fn test_resolve_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), b"hello").expect("write");
        let conf = conf_with_root(dir.path());

        let res = resolve(&conf, "/a.txt", false).expect("resolution");
        let meta = res.meta.expect("meta");
        assert_eq!(meta.size, 5);
        assert!(!meta.is_dir);
        assert!(res.path_info.is_none());
    }

    #[test]
    fn test_resolve_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = conf_with_root(dir.path());
        let res = resolve(&conf, "/nope.txt", false).expect("resolution");
        assert!(res.meta.is_none());
    }

    #[test]
    fn test_resolve_no_root() {
        let conf = RuntimeConfig::from_config(&Config::default()).expect("conf");
        assert!(resolve(&conf, "/x", false).is_none());
    }

    #[test]
    fn test_gzip_sibling_probe() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("big.js.gz"), b"gzdata").expect("write");
        let conf = conf_with_root(dir.path());

        let res = resolve(&conf, "/big.js", true).expect("resolution");
        let meta = res.meta.expect("meta");
        assert!(meta.gzipped);
        assert!(res.path.to_string_lossy().ends_with("big.js.gz"));

        // Without gzip acceptance the literal miss stands.
        let res = resolve(&conf, "/big.js", false).expect("resolution");
        assert!(res.meta.is_none());
    }

    #[test]
    fn test_path_info_split() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("run.cgi"), b"#!/bin/sh\n").expect("write");
        let conf = conf_with_root(dir.path());

        let res = resolve(&conf, "/run.cgi/extra/info", false).expect("resolution");
        assert!(res.path.to_string_lossy().ends_with("run.cgi"));
        assert_eq!(res.path_info.as_deref(), Some("/extra/info"));
    }

    #[test]
    fn test_rewrite_overrides_root() {
        let root = tempfile::tempdir().expect("tempdir");
        let alt = tempfile::tempdir().expect("tempdir");
        fs::write(alt.path().join("x.txt"), b"alt").expect("write");

        let mut cfg = Config::default();
        cfg.web.document_root = root.path().to_string_lossy().into_owned();
        cfg.web.url_rewrites = format!("/static={}", alt.path().to_string_lossy());
        let conf = RuntimeConfig::from_config(&cfg).expect("conf");

        let res = resolve(&conf, "/static/x.txt", false).expect("resolution");
        assert_eq!(res.meta.expect("meta").size, 3);
    }

    #[test]
    fn test_hidden_patterns_and_auth_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let auth = dir.path().join(".htpasswd");
        fs::write(&auth, b"user:realm:hash").expect("write");

        let mut cfg = Config::default();
        cfg.web.document_root = dir.path().to_string_lossy().into_owned();
        cfg.web.hide_files_patterns = "**/secret*$".to_string();
        cfg.auth.global_auth_file = auth.to_string_lossy().into_owned();
        let conf = RuntimeConfig::from_config(&cfg).expect("conf");

        assert!(is_hidden(&conf, &dir.path().join("secret.txt")));
        assert!(is_hidden(&conf, &auth));
        assert!(!is_hidden(&conf, &dir.path().join("open.txt")));
    }

    #[test]
    fn test_find_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("index.htm"), b"<html>").expect("write");
        let conf = conf_with_root(dir.path());

        let (path, meta) = find_index(&conf, dir.path()).expect("index");
        assert!(path.to_string_lossy().ends_with("index.htm"));
        assert_eq!(meta.size, 6);
    }

    #[test]
    fn test_cgi_ssi_classification() {
        let conf = conf_with_root(Path::new("/tmp"));
        assert!(is_cgi(&conf, Path::new("/tmp/a.cgi")));
        assert!(!is_cgi(&conf, Path::new("/tmp/a.html")));
        assert!(is_ssi(&conf, Path::new("/tmp/a.shtml")));
        assert!(!is_ssi(&conf, Path::new("/tmp/a.cgi")));
    }
}

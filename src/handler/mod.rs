//! Request handler module
//!
//! Gathers the facts the router needs (authorization, listener kind,
//! filesystem resolution, conditional headers), asks the router for a
//! decision, and dispatches to the matching responder.

pub mod auth;
pub mod cgi;
pub mod dav;
pub mod listing;
pub mod resolve;
pub mod router;
pub mod ssi;
pub mod static_files;

use std::path::PathBuf;
use std::sync::Arc;

use crate::http::buffer::RecvBuffer;
use crate::http::request::{self, KNOWN_METHODS};
use crate::http::response::Head;
use crate::http::{cache, RequestInfo};
use crate::server::conn::Conn;

use resolve::{FileMeta, Resolution};
use router::{route, Action, ResourceKind, RouteRequest};

/// Serve one parsed request. The response, whatever it is, has been
/// written when this returns; the caller only handles keep-alive.
pub fn handle_request(conn: &mut Conn, buf: &mut RecvBuffer, req: &RequestInfo) {
    let (decoded, query) = req.decoded_uri();
    let uri = request::canonicalize_uri(&decoded);

    let is_write = req.is_write_method();
    let (authorized, read_user) = auth::authorize_read(&conn.state.conf, req);
    let (write_authorized, write_user) = if is_write {
        auth::authorize_write(&conn.state.conf, req)
    } else {
        (true, None)
    };
    conn.remote_user = read_user.or(write_user);

    let tls_redirect_applies =
        !conn.is_tls && conn.is_redirect_listener && conn.state.tls_port.is_some();

    // The embedding hook sees every request that passes the ACL, TLS
    // redirect and read authorization, in that order.
    let mut intercepted = false;
    if !tls_redirect_applies && (is_write || authorized) {
        let events = Arc::clone(&conn.state.events);
        intercepted = events.handle_request(&mut conn.stream, req);
        if intercepted {
            // The hook's response framing is opaque to us.
            conn.must_close = true;
        }
    }

    if !intercepted
        && !tls_redirect_applies
        && (is_write || authorized)
        && !KNOWN_METHODS.contains(&req.method.as_str())
    {
        conn.send_error(501, "Method is not implemented", Some(req));
        return;
    }

    let accept_gzip = req
        .header("Accept-Encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("gzip"));
    let resolution = resolve::resolve(&conn.state.conf, &uri, accept_gzip);
    let facts = gather_facts(conn, req, &uri, resolution.as_ref());

    let rr = RouteRequest {
        method: &req.method,
        uri: &uri,
        is_tls: conn.is_tls,
        redirect_listener: conn.is_redirect_listener,
        tls_available: conn.state.tls_port.is_some(),
        document_root_set: resolution.is_some(),
        authorized,
        write_authorized,
        intercepted,
        resource: facts.resource,
        hidden: facts.hidden,
        index_resolved: facts.index_resolved,
        listing_enabled: conn.state.conf.enable_directory_listing,
        is_cgi: facts.is_cgi,
        is_ssi: facts.is_ssi,
        not_modified: facts.not_modified,
    };
    let action = route(&rr);

    // Filesystem GET responders never serve other methods.
    if matches!(
        action,
        Action::StaticFile | Action::Ssi | Action::NotModified | Action::Listing
    ) && !matches!(req.method.as_str(), "GET" | "HEAD")
    {
        conn.send_error(501, "Method is not implemented for this resource", Some(req));
        return;
    }

    let path = facts.path;
    let meta = facts.meta;
    match action {
        Action::RedirectToTls => redirect_to_tls(conn, req),
        Action::AuthChallenge | Action::WriteAuthChallenge => auth::send_challenge(conn),
        Action::Intercepted => {}
        Action::Options => send_options(conn),
        Action::NoDocumentRoot | Action::NotFound => {
            conn.send_error(404, "File not found", Some(req));
        }
        Action::Put => dav::handle_put(conn, buf, req, &uri, &path),
        Action::Mkcol => dav::handle_mkcol(conn, req, &path),
        Action::Delete => dav::handle_delete(conn, req, &path),
        Action::RedirectAddSlash => {
            let q = query.map(|q| format!("?{q}")).unwrap_or_default();
            conn.send_redirect(301, &format!("{uri}/{q}"));
        }
        Action::Propfind => {
            if let Some(meta) = meta {
                dav::handle_propfind(conn, req, &uri, &path, &meta);
            }
        }
        Action::Listing => listing::handle_listing(conn, req, &uri, &path),
        Action::ListingDenied => {
            conn.send_error(403, "Directory listing denied", Some(req));
        }
        Action::Cgi => cgi::handle_cgi(conn, buf, req, &uri, &path, facts.path_info.as_deref()),
        Action::CgiNotImplemented => {
            conn.send_error(501, "CGI supports GET, HEAD and POST only", Some(req));
        }
        Action::Ssi => ssi::handle_ssi(conn, req, &path),
        Action::NotModified => conn.send_error(304, "", Some(req)),
        Action::StaticFile => {
            if let Some(meta) = meta {
                static_files::handle_file(conn, req, &path, &meta);
            }
        }
    }
}

struct Facts {
    path: PathBuf,
    meta: Option<FileMeta>,
    path_info: Option<String>,
    resource: Option<ResourceKind>,
    hidden: bool,
    index_resolved: bool,
    is_cgi: bool,
    is_ssi: bool,
    not_modified: bool,
}

/// Post-process the raw resolution: index substitution for directory
/// URIs (PROPFIND excepted, it describes the collection itself), then
/// classification of the final target.
fn gather_facts(conn: &Conn, req: &RequestInfo, uri: &str, resolution: Option<&Resolution>) -> Facts {
    let conf = &conn.state.conf;
    let Some(res) = resolution else {
        return Facts {
            path: PathBuf::new(),
            meta: None,
            path_info: None,
            resource: None,
            hidden: false,
            index_resolved: false,
            is_cgi: false,
            is_ssi: false,
            not_modified: false,
        };
    };

    let mut path = res.path.clone();
    let mut meta = res.meta;
    let mut index_resolved = false;
    if let Some(m) = meta {
        if m.is_dir && uri.ends_with('/') && req.method != "PROPFIND" {
            if let Some((ipath, imeta)) = resolve::find_index(conf, &path) {
                path = ipath;
                meta = Some(imeta);
                index_resolved = true;
            }
        }
    }

    let resource = meta.map(|m| {
        if m.is_dir {
            ResourceKind::Dir
        } else {
            ResourceKind::File
        }
    });
    let is_cgi = resolve::is_cgi(conf, &path);
    let is_ssi = resolve::is_ssi(conf, &path);
    let not_modified = meta.is_some_and(|m| {
        !m.is_dir
            && cache::is_not_modified(
                req.header("If-None-Match"),
                req.header("If-Modified-Since"),
                m.modified,
                m.size,
            )
    });

    Facts {
        hidden: resolve::is_hidden(conf, &path),
        path,
        meta,
        path_info: res.path_info.clone(),
        resource,
        index_resolved,
        is_cgi,
        is_ssi,
        not_modified,
    }
}

/// 302 to the same URI on the TLS listener.
fn redirect_to_tls(conn: &mut Conn, req: &RequestInfo) {
    let Some(port) = conn.state.tls_port else {
        return;
    };
    let host = req
        .header("Host")
        .map_or_else(|| conn.local.ip().to_string(), strip_port);
    conn.send_redirect(302, &format!("https://{host}:{port}{}", req.uri));
}

fn strip_port(host: &str) -> String {
    // Bracketed IPv6 literals keep their brackets.
    if let Some(end) = host.find(']') {
        return host[..=end].to_string();
    }
    host.split(':').next().unwrap_or(host).to_string()
}

/// OPTIONS advertises every method the engine itself understands.
fn send_options(conn: &mut Conn) {
    conn.status = 200;
    let head = Head::status(200)
        .header("Date", cache::http_date_now())
        .header("Allow", KNOWN_METHODS.join(", "))
        .header("DAV", "1")
        .header("Content-Length", 0)
        .connection(conn.should_keep_alive())
        .finish();
    let _ = conn.write_bytes(&head);
}

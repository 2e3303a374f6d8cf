//! Request routing dispatch module
//!
//! The routing decision is a pure function over facts the caller has
//! already gathered (method, listener kind, authorization, what the
//! filesystem said about the target). Keeping it side-effect free makes
//! the priority order a directly testable artifact.

/// What the resolved target turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Dir,
}

/// Facts about one request, precomputed by `handle_request`.
#[derive(Debug)]
pub struct RouteRequest<'a> {
    pub method: &'a str,
    /// Canonicalized URI, query string stripped.
    pub uri: &'a str,
    pub is_tls: bool,
    /// Arrived on a redirect-to-TLS listener.
    pub redirect_listener: bool,
    /// A TLS listener exists to redirect to.
    pub tls_available: bool,
    pub document_root_set: bool,
    /// Passed the global (read) authorization check.
    pub authorized: bool,
    /// Passed the PUT/DELETE/MKCOL authorization check.
    pub write_authorized: bool,
    /// An embedding hook already produced the response.
    pub intercepted: bool,
    /// Filesystem resolution outcome, `None` when nothing was found.
    pub resource: Option<ResourceKind>,
    /// Target matches a hide pattern or is an auth file.
    pub hidden: bool,
    /// A directory URI was substituted with an index file.
    pub index_resolved: bool,
    pub listing_enabled: bool,
    pub is_cgi: bool,
    pub is_ssi: bool,
    /// Conditional headers allow a 304.
    pub not_modified: bool,
}

/// The responder chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 302 to the TLS listener.
    RedirectToTls,
    /// 401 with a challenge (read authorization).
    AuthChallenge,
    /// Hook already answered; only bookkeeping remains.
    Intercepted,
    /// 200 with the allowed-methods list.
    Options,
    /// 404: no document root configured.
    NoDocumentRoot,
    /// 401 with a challenge (write authorization).
    WriteAuthChallenge,
    Put,
    Mkcol,
    Delete,
    /// 404: missing, hidden, or an unroutable method.
    NotFound,
    /// 301 adding the trailing slash to a directory URI.
    RedirectAddSlash,
    Propfind,
    /// Generated directory listing.
    Listing,
    /// 403: directory with no index and listing disabled.
    ListingDenied,
    Cgi,
    /// 501: CGI target with a method CGI cannot serve.
    CgiNotImplemented,
    Ssi,
    NotModified,
    StaticFile,
}

fn is_write(method: &str) -> bool {
    matches!(method, "PUT" | "DELETE" | "MKCOL")
}

/// Decide how to answer. Earlier rules always beat later ones.
pub fn route(r: &RouteRequest) -> Action {
    if !r.is_tls && r.redirect_listener && r.tls_available {
        return Action::RedirectToTls;
    }
    if !is_write(r.method) && !r.authorized {
        return Action::AuthChallenge;
    }
    if r.intercepted {
        return Action::Intercepted;
    }
    if r.method == "OPTIONS" {
        return Action::Options;
    }
    if !r.document_root_set {
        return Action::NoDocumentRoot;
    }
    if is_write(r.method) && !r.write_authorized {
        return Action::WriteAuthChallenge;
    }
    match r.method {
        "PUT" => return Action::Put,
        "MKCOL" => return Action::Mkcol,
        "DELETE" => return Action::Delete,
        _ => {}
    }

    let Some(kind) = r.resource else {
        return Action::NotFound;
    };
    if r.hidden {
        return Action::NotFound;
    }
    if kind == ResourceKind::Dir && !r.index_resolved && !r.uri.ends_with('/') {
        return Action::RedirectAddSlash;
    }
    if r.method == "PROPFIND" {
        return Action::Propfind;
    }
    if kind == ResourceKind::Dir && !r.index_resolved {
        return if r.listing_enabled {
            Action::Listing
        } else {
            Action::ListingDenied
        };
    }
    if r.is_cgi {
        return if matches!(r.method, "GET" | "HEAD" | "POST") {
            Action::Cgi
        } else {
            Action::CgiNotImplemented
        };
    }
    if r.is_ssi {
        return Action::Ssi;
    }
    if r.not_modified {
        return Action::NotModified;
    }
    Action::StaticFile
}

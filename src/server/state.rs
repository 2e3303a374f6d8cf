// Shared server state
// The configuration snapshot and lifecycle flag shared by the acceptor,
// every worker, and the responders. Built once at startup; immutable
// afterwards except for the stop phase.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{split_list, Config};
use crate::error::ConfigError;
use crate::events::EventHandler;
use crate::logger;
use crate::server::acl::AccessList;
use crate::transport::TlsProvider;

/// Stop phases. The transition to `STOPPED` is the acceptor's very last
/// action, after all workers have been joined.
pub const RUNNING: u8 = 0;
pub const STOPPING: u8 = 1;
pub const STOPPED: u8 = 2;

/// Validated, parsed runtime configuration.
pub struct RuntimeConfig {
    pub document_root: Option<PathBuf>,
    pub index_files: Vec<String>,
    pub enable_directory_listing: bool,
    pub enable_keep_alive: bool,
    pub request_timeout: Option<Duration>,
    pub num_threads: usize,
    pub acl: AccessList,
    /// `uri_prefix -> directory` pairs tried in order before the
    /// document root.
    pub rewrites: Vec<(String, String)>,
    pub hide_patterns: Option<String>,
    pub cgi_pattern: String,
    pub cgi_interpreter: Option<PathBuf>,
    pub ssi_pattern: String,
    pub enable_ssi_exec: bool,
    pub auth_realm: String,
    pub global_auth_file: Option<PathBuf>,
    pub put_delete_auth_file: Option<PathBuf>,
    pub extra_mime_types: Vec<(String, String)>,
}

impl RuntimeConfig {
    pub fn from_config(cfg: &Config) -> Result<RuntimeConfig, ConfigError> {
        let mut rewrites = Vec::new();
        for pair in split_list(&cfg.web.url_rewrites) {
            let (prefix, dir) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidRewrite(pair.clone()))?;
            if prefix.is_empty() || dir.is_empty() {
                return Err(ConfigError::InvalidRewrite(pair.clone()));
            }
            rewrites.push((prefix.to_string(), dir.to_string()));
        }

        let mut extra_mime_types = Vec::new();
        for pair in split_list(&cfg.mime.extra_mime_types) {
            if let Some((ext, mime)) = pair.split_once('=') {
                let ext = ext.trim_start_matches('.');
                if !ext.is_empty() && !mime.is_empty() {
                    extra_mime_types.push((ext.to_string(), mime.to_string()));
                }
            }
        }

        Ok(RuntimeConfig {
            document_root: non_empty(&cfg.web.document_root).map(PathBuf::from),
            index_files: split_list(&cfg.web.index_files),
            enable_directory_listing: cfg.web.enable_directory_listing,
            enable_keep_alive: cfg.server.enable_keep_alive,
            request_timeout: match cfg.server.request_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            num_threads: cfg.server.num_threads.max(1),
            acl: AccessList::parse(&cfg.access.access_control_list)?,
            rewrites,
            hide_patterns: non_empty(&cfg.web.hide_files_patterns).map(str::to_string),
            cgi_pattern: cfg.cgi.cgi_pattern.clone(),
            cgi_interpreter: non_empty(&cfg.cgi.cgi_interpreter).map(PathBuf::from),
            ssi_pattern: cfg.cgi.ssi_pattern.clone(),
            enable_ssi_exec: cfg.cgi.enable_ssi_exec,
            auth_realm: cfg.auth.auth_realm.clone(),
            global_auth_file: auth_file(&cfg.auth.global_auth_file)?,
            put_delete_auth_file: auth_file(&cfg.auth.put_delete_auth_file)?,
            extra_mime_types,
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A configured auth file must be openable at startup; a typo here would
/// otherwise silently lock out (or expose) the whole tree.
fn auth_file(path: &str) -> Result<Option<PathBuf>, ConfigError> {
    match non_empty(path) {
        None => Ok(None),
        Some(p) => {
            let path = PathBuf::from(p);
            std::fs::File::open(&path).map_err(|source| ConfigError::AuthFile {
                path: path.clone(),
                source,
            })?;
            Ok(Some(path))
        }
    }
}

/// Everything a worker needs to serve requests.
pub struct ServerState {
    pub conf: RuntimeConfig,
    pub stop: AtomicU8,
    pub events: Arc<dyn EventHandler>,
    pub tls: Option<Arc<dyn TlsProvider>>,
    /// Port of the first TLS listener, target of `r` listeners.
    pub tls_port: Option<u16>,
}

impl ServerState {
    pub fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst) != RUNNING
    }

    /// Report a request-scoped error, giving the embedding hook first
    /// refusal on the line.
    pub fn report_error(&self, peer: Option<SocketAddr>, request: Option<&str>, message: &str) {
        if self.events.log_message(message) {
            return;
        }
        logger::log_request_error(peer, request, message);
    }
}

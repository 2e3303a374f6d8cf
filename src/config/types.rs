// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cgi: CgiConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mime: MimeConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Comma-separated listener specs, each `[ip_address:]port[s|r]`.
    /// `s` marks a TLS listener, `r` a redirect-to-TLS listener.
    pub listening_ports: String,
    /// Size of the fixed worker pool.
    pub num_threads: usize,
    /// Single read/write timeout applied to accepted sockets, in ms.
    pub request_timeout_ms: u64,
    pub enable_keep_alive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listening_ports: default_listening_ports(),
            num_threads: default_num_threads(),
            request_timeout_ms: default_request_timeout_ms(),
            enable_keep_alive: true,
        }
    }
}

fn default_listening_ports() -> String {
    "8080".to_string()
}

fn default_num_threads() -> usize {
    num_cpus::get().max(1)
}

#[allow(clippy::missing_const_for_fn)]
fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Static web space configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    /// Root of the served tree. Empty disables filesystem serving;
    /// every URI then answers 404 unless an embedding hook claims it.
    #[serde(default)]
    pub document_root: String,
    /// Comma-separated index file candidates for directory URIs.
    #[serde(default = "default_index_files")]
    pub index_files: String,
    #[serde(default)]
    pub enable_directory_listing: bool,
    /// Glob patterns (see `http::pattern`) of paths never served.
    #[serde(default)]
    pub hide_files_patterns: String,
    /// Comma-separated `uri_prefix=directory` pairs overriding the
    /// document root for matching URIs.
    #[serde(default)]
    pub url_rewrites: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            document_root: String::new(),
            index_files: default_index_files(),
            enable_directory_listing: false,
            hide_files_patterns: String::new(),
            url_rewrites: String::new(),
        }
    }
}

fn default_index_files() -> String {
    "index.html,index.htm,index.cgi,index.shtml,index.php".to_string()
}

/// Digest-free Basic authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Realm sent in WWW-Authenticate challenges.
    #[serde(default = "default_auth_realm")]
    pub auth_realm: String,
    /// Passwords file protecting all reads. Absent means open access.
    #[serde(default)]
    pub global_auth_file: String,
    /// Passwords file gating PUT/DELETE/MKCOL. Absent disables writes.
    #[serde(default)]
    pub put_delete_auth_file: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_realm: default_auth_realm(),
            global_auth_file: String::new(),
            put_delete_auth_file: String::new(),
        }
    }
}

fn default_auth_realm() -> String {
    "meerkat".to_string()
}

/// CGI and server-side-include configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CgiConfig {
    #[serde(default = "default_cgi_pattern")]
    pub cgi_pattern: String,
    /// Interpreter prepended to every CGI invocation. Empty means the
    /// script itself is the executable.
    #[serde(default)]
    pub cgi_interpreter: String,
    #[serde(default = "default_ssi_pattern")]
    pub ssi_pattern: String,
    /// Allow `<!--#exec -->` directives to run shell commands.
    #[serde(default)]
    pub enable_ssi_exec: bool,
}

impl Default for CgiConfig {
    fn default() -> Self {
        Self {
            cgi_pattern: default_cgi_pattern(),
            cgi_interpreter: String::new(),
            ssi_pattern: default_ssi_pattern(),
            enable_ssi_exec: false,
        }
    }
}

fn default_cgi_pattern() -> String {
    "**.cgi$|**.pl$|**.php$".to_string()
}

fn default_ssi_pattern() -> String {
    "**.shtml$|**.shtm$".to_string()
}

/// Network access control configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessConfig {
    /// Comma-separated `[+|-]a.b.c.d[/bits]` rules; the last matching
    /// rule wins. Empty allows everyone.
    #[serde(default)]
    pub access_control_list: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Access log file path (optional, disabled if not set)
    #[serde(default)]
    pub access_log_file: String,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: String,
}

/// Extra MIME mappings layered over the builtin table
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MimeConfig {
    /// Comma-separated `.ext=type` pairs, e.g. `.tbn=image/jpeg`.
    #[serde(default)]
    pub extra_mime_types: String,
}

/// Split a comma-separated configuration list, trimming whitespace and
/// dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Configuration module entry point
// Loads configuration from file and environment, with builtin defaults

mod types;

pub use types::{
    split_list, AccessConfig, AuthConfig, CgiConfig, Config, LoggingConfig, MimeConfig,
    ServerConfig, WebConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "meerkat.toml" when no path specified
    ///
    /// Environment variables prefixed with `MEERKAT_` override file
    /// values, e.g. `MEERKAT_SERVER__LISTENING_PORTS=8443s`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("MEERKAT").separator("__"))
            .set_default("server.listening_ports", "8080")?
            .set_default("server.num_threads", i64::try_from(num_cpus::get()).unwrap_or(4))?
            .set_default("server.request_timeout_ms", 30_000)?
            .set_default("server.enable_keep_alive", true)?
            .set_default("web.document_root", "")?
            .set_default(
                "web.index_files",
                "index.html,index.htm,index.cgi,index.shtml,index.php",
            )?
            .set_default("web.enable_directory_listing", false)?
            .set_default("web.hide_files_patterns", "")?
            .set_default("web.url_rewrites", "")?
            .set_default("auth.auth_realm", "meerkat")?
            .set_default("auth.global_auth_file", "")?
            .set_default("auth.put_delete_auth_file", "")?
            .set_default("cgi.cgi_pattern", "**.cgi$|**.pl$|**.php$")?
            .set_default("cgi.cgi_interpreter", "")?
            .set_default("cgi.ssi_pattern", "**.shtml$|**.shtm$")?
            .set_default("cgi.enable_ssi_exec", false)?
            .set_default("access.access_control_list", "")?
            .set_default("logging.access_log_file", "")?
            .set_default("logging.error_log_file", "")?
            .set_default("mime.extra_mime_types", "")?
            .build()?;

        settings.try_deserialize()
    }
}

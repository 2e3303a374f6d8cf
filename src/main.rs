use std::process::ExitCode;

use meerkat::{logger, Config, Server};

fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "meerkat.toml".to_string());

    let cfg = match Config::load_from(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("cannot load configuration from {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logger::init(&cfg) {
        eprintln!("cannot open log files: {e}");
        return ExitCode::FAILURE;
    }

    let mut server = match Server::start(&cfg) {
        Ok(server) => server,
        Err(e) => {
            logger::log_error(&format!("startup failed: {e}"));
            return ExitCode::FAILURE;
        }
    };
    logger::log_server_start(server.local_addrs(), cfg.server.num_threads, &cfg);

    wait_for_shutdown(&server);
    server.stop();
    println!("Server stopped");
    ExitCode::SUCCESS
}

/// Block until SIGINT or SIGTERM arrives.
#[cfg(unix)]
fn wait_for_shutdown(_server: &Server) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            if let Some(sig) = signals.forever().next() {
                logger::log_warning(&format!("received signal {sig}, shutting down"));
            }
        }
        Err(e) => {
            logger::log_error(&format!("cannot install signal handlers: {e}"));
            _server.wait();
        }
    }
}

#[cfg(not(unix))]
fn wait_for_shutdown(server: &Server) {
    server.wait();
}

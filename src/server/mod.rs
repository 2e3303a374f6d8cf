// Server module entry point
// Wires listeners, the acceptor thread and the worker pool together and
// exposes the start/stop lifecycle to embedders and the binary.

pub mod acceptor;
pub mod acl;
pub mod conn;
pub mod handoff;
pub mod listener;
pub mod state;
pub mod worker;

pub use acl::AccessList;
pub use conn::Conn;
pub use state::{RuntimeConfig, ServerState};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::error::ConfigError;
use crate::events::{EventHandler, NoopEvents};
use crate::transport::TlsProvider;

use listener::{bind_all, parse_port_spec};
use state::{RUNNING, STOPPED, STOPPING};

/// A running server. Dropping it performs a full synchronous shutdown.
pub struct Server {
    state: Arc<ServerState>,
    master: Option<JoinHandle<()>>,
    addrs: Vec<SocketAddr>,
}

impl Server {
    /// Start with the default (no-op) event handler and no TLS provider.
    pub fn start(config: &Config) -> Result<Server, ConfigError> {
        Server::start_with(config, Arc::new(NoopEvents), None)
    }

    /// Start with embedding hooks. Fails fast on any configuration
    /// problem; nothing keeps running after an error return.
    pub fn start_with(
        config: &Config,
        events: Arc<dyn EventHandler>,
        tls: Option<Arc<dyn TlsProvider>>,
    ) -> Result<Server, ConfigError> {
        let conf = RuntimeConfig::from_config(config)?;
        let specs = parse_port_spec(&config.server.listening_ports)?;
        if specs.iter().any(|s| s.tls) && tls.is_none() {
            return Err(ConfigError::TlsNotConfigured);
        }

        let bound = bind_all(&specs)?;
        let addrs: Vec<SocketAddr> = bound.iter().map(|b| b.addr).collect();
        let tls_port = bound.iter().find(|b| b.tls).map(|b| b.addr.port());

        let state = Arc::new(ServerState {
            conf,
            stop: AtomicU8::new(RUNNING),
            events,
            tls,
            tls_port,
        });

        let (tx, rx) = handoff::channel();
        let mut workers = Vec::with_capacity(state.conf.num_threads);
        for i in 0..state.conf.num_threads {
            let st = Arc::clone(&state);
            let worker_rx = rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("meerkat-worker-{i}"))
                .spawn(move || worker::run(&st, &worker_rx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Unwind what we started before reporting failure.
                    drop(tx);
                    drop(rx);
                    for w in workers {
                        let _ = w.join();
                    }
                    return Err(ConfigError::Spawn(e));
                }
            }
        }
        drop(rx);

        let st = Arc::clone(&state);
        let master = thread::Builder::new()
            .name("meerkat-acceptor".to_string())
            .spawn(move || acceptor::run(&st, bound, tx, workers))
            .map_err(ConfigError::Spawn)?;

        Ok(Server {
            state,
            master: Some(master),
            addrs,
        })
    }

    /// The concrete bound addresses, ephemeral ports resolved.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Signal shutdown and wait for the acceptor to finish draining:
    /// in-flight requests complete, workers are joined, listeners are
    /// closed. Safe to call more than once.
    pub fn stop(&mut self) {
        // Only the first call may flip RUNNING to STOPPING; a repeat
        // call (Drop makes one after an explicit stop) must not regress
        // the STOPPED phase the acceptor stored on its way out.
        let _ = self.state.stop.compare_exchange(
            RUNNING,
            STOPPING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Some(master) = self.master.take() {
            let _ = master.join();
            debug_assert_eq!(self.state.stop.load(Ordering::SeqCst), STOPPED);
        }
    }

    /// Block the calling thread until `stop` is invoked from elsewhere.
    pub fn wait(&self) {
        while self.state.stop.load(Ordering::SeqCst) != STOPPED {
            thread::sleep(Duration::from_millis(100));
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

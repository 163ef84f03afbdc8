pub mod config;
pub mod error;
pub mod registry;
pub mod state;

pub use config::ServerConfig;
pub use error::HotcastError;
pub use registry::{Connection, ConnectionId, ConnectionState, Registry};
pub use state::{LoopPhase, LoopState, ReloadHandle, ShutdownHandle, SignalFlags};

use std::path::PathBuf;

/// Layers command-line overrides on top of a file or default configuration.
///
/// Unset overrides leave the underlying value alone; `build` validates the
/// merged result.
#[derive(Debug, Default)]
pub struct ServerBuilder {
    pub config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the base configuration.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host {
            self.config.host = host;
        }
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.config.port = port;
        }
        self
    }

    pub fn base_path(mut self, base_path: Option<String>) -> Self {
        if let Some(base_path) = base_path {
            self.config.base_path = base_path;
        }
        self
    }

    pub fn domain(mut self, domain: Option<String>) -> Self {
        if let Some(domain) = domain {
            self.config.domain = domain;
        }
        self
    }

    pub fn cert_dir(mut self, cert_dir: Option<PathBuf>) -> Self {
        if let Some(cert_dir) = cert_dir {
            self.config.cert_dir = cert_dir;
        }
        self
    }

    pub fn build(self) -> Result<ServerConfig, HotcastError> {
        self.config.validated()
    }
}

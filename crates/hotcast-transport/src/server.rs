use hotcast_core::{HotcastError, ServerConfig, SignalFlags};

use crate::bootstrap::Bootstrapper;
use crate::reactor::Reactor;

/// Entry point tying bootstrap and the event loop together.
pub struct HotcastServer {
    config: ServerConfig,
    flags: SignalFlags,
}

impl HotcastServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            flags: SignalFlags::new(),
        }
    }

    /// Shares request flags with the caller, typically ones already wired
    /// to process signals.
    pub fn with_flags(mut self, flags: SignalFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn flags(&self) -> &SignalFlags {
        &self.flags
    }

    /// Binds the listener (TLS when certificates load, plain otherwise) and
    /// returns a reactor ready to run.
    pub fn bind(self) -> Result<Reactor, HotcastError> {
        tracing::info!(
            "Starting hotcast for {} on {}:{}",
            self.config.domain,
            self.config.host,
            self.config.port
        );
        let bound = Bootstrapper::new(&self.config).bind()?;
        Reactor::new(&self.config, bound, self.flags)
    }

    /// Binds and runs until shutdown is requested.
    pub fn start(self) -> Result<(), HotcastError> {
        self.bind()?.run()
    }
}

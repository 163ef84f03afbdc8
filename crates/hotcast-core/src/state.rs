use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cross-thread request flags consumed by the reactor once per iteration.
///
/// Writers (signal handlers, [`ShutdownHandle`], [`ReloadHandle`]) only ever
/// store `true`. The loop thread is the only reader that clears a flag.
#[derive(Debug, Clone, Default)]
pub struct SignalFlags {
    shutdown: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
}

impl SignalFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::Release);
    }

    /// Clears the reload flag, returning whether it was set.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::AcqRel)
    }

    /// Raw flag for registration with an async-signal-safe setter.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn reload_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.reload)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.clone())
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle(self.clone())
    }
}

/// Asks a running reactor to stop at its next iteration boundary.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(SignalFlags);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.request_shutdown();
    }

    pub fn is_requested(&self) -> bool {
        self.0.shutdown_requested()
    }
}

/// Asks a running reactor to broadcast a full reload.
#[derive(Debug, Clone)]
pub struct ReloadHandle(SignalFlags);

impl ReloadHandle {
    pub fn request(&self) {
        self.0.request_reload();
    }
}

/// Where the reactor is in its iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Polling,
    Dispatching,
    ShuttingDown,
    Stopped,
}

/// Loop-thread view of the run state.
#[derive(Debug)]
pub struct LoopState {
    flags: SignalFlags,
    phase: LoopPhase,
}

impl LoopState {
    pub fn new(flags: SignalFlags) -> Self {
        Self {
            flags,
            phase: LoopPhase::Idle,
        }
    }

    pub fn flags(&self) -> &SignalFlags {
        &self.flags
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.phase, LoopPhase::ShuttingDown | LoopPhase::Stopped)
    }

    /// Moves to `next` unless the loop has already begun shutting down.
    pub fn enter(&mut self, next: LoopPhase) {
        if self.is_running() || next == LoopPhase::Stopped {
            self.phase = next;
        }
    }

    pub fn begin_shutdown(&mut self) {
        if self.phase != LoopPhase::Stopped {
            self.phase = LoopPhase::ShuttingDown;
        }
    }
}

//! Raw TCP/TLS plumbing for the live-reload broadcaster: listener bootstrap,
//! the readiness loop, subscriber fan-out and the reload inputs feeding it.

pub mod bootstrap;
pub mod broadcaster;
pub mod keepalive;
pub mod reactor;
pub mod reload;
pub mod server;
pub mod signals;
pub mod stream;
pub mod trigger;

pub use bootstrap::{load_tls_config, BoundListener, Bootstrapper};
pub use broadcaster::{BroadcastReport, BroadcastStats, Broadcaster};
pub use keepalive::{KeepAlive, Ping, KEEP_ALIVE_INTERVAL};
pub use reactor::Reactor;
pub use reload::{ReloadPayload, ReloadQueue, ALL_FILES};
pub use server::HotcastServer;
pub use stream::{probe_liveness, ClientStream, Liveness};
pub use trigger::{parse_trigger, write_trigger_file, TriggerBridge};

//! Single-instance enforcement for the broadcaster process.

pub mod guard;
pub mod pidfile;
pub mod process;

pub use guard::{stop_instance, InstanceGuard};
pub use pidfile::{delete_pidfile, read_pidfile, write_pidfile};
pub use process::{pid_exists, terminate, Outcome, Termination};

//! Native process probing and termination. Never shells out.

use std::io;
use std::time::Duration;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// SIGTERM grace period and how often death is polled within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub grace: Duration,
    pub interval: Duration,
}

impl Default for Termination {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(3),
            interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No such process when we looked.
    AlreadyGone,
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Killed,
}

/// Whether a process with `pid` exists (`kill(pid, 0)`).
///
/// A permission error still proves existence.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    let Some(pid) = to_pid(pid) else {
        return false;
    };
    match signal::kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn pid_exists(_pid: u32) -> bool {
    false
}

/// Sends SIGTERM, polls for exit over the grace period, then escalates to
/// SIGKILL.
#[cfg(unix)]
pub fn terminate(pid: u32, policy: Termination) -> io::Result<Outcome> {
    let Some(target) = to_pid(pid) else {
        return Ok(Outcome::AlreadyGone);
    };

    match signal::kill(target, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(Outcome::AlreadyGone),
        Err(e) => return Err(io::Error::other(e)),
    }
    tracing::debug!("Sent SIGTERM to {}", pid);
    if wait_for_exit(pid, policy) {
        return Ok(Outcome::Terminated);
    }

    tracing::warn!("Process {} ignored SIGTERM for {:?}, sending SIGKILL", pid, policy.grace);
    match signal::kill(target, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(Outcome::Terminated),
        Err(e) => return Err(io::Error::other(e)),
    }
    if wait_for_exit(pid, policy) {
        return Ok(Outcome::Killed);
    }

    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("process {} did not exit after SIGKILL", pid),
    ))
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32, _policy: Termination) -> io::Result<Outcome> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process termination is only implemented on Unix",
    ))
}

#[cfg(unix)]
fn wait_for_exit(pid: u32, policy: Termination) -> bool {
    let mut waited = Duration::ZERO;
    while waited < policy.grace {
        std::thread::sleep(policy.interval);
        waited += policy.interval;
        if !pid_exists(pid) {
            return true;
        }
    }
    !pid_exists(pid)
}

/// Zero would address our own process group, and values past `i32::MAX`
/// would wrap into it.
#[cfg(unix)]
fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|raw| *raw > 0).map(Pid::from_raw)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::thread;

    fn quick() -> Termination {
        Termination {
            grace: Duration::from_millis(500),
            interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn own_process_exists() {
        assert!(pid_exists(std::process::id()));
        assert!(!pid_exists(0));
        assert!(!pid_exists(u32::MAX));
    }

    #[test]
    fn sleeping_child_is_terminated() {
        let mut child = Command::new("sleep").arg("30").stdout(Stdio::null()).spawn().unwrap();
        let pid = child.id();
        // Reap concurrently, otherwise the zombie keeps answering kill(pid, 0).
        let reaper = thread::spawn(move || child.wait());

        assert!(pid_exists(pid));
        let outcome = terminate(pid, quick()).unwrap();
        assert_eq!(outcome, Outcome::Terminated);

        let status = reaper.join().unwrap().unwrap();
        assert!(!status.success());
        assert!(!pid_exists(pid));
    }

    #[test]
    fn vanished_process_is_already_gone() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(!pid_exists(pid));
        assert_eq!(terminate(pid, quick()).unwrap(), Outcome::AlreadyGone);
    }
}

use std::io;
use std::path::{Path, PathBuf};

use hotcast_core::HotcastError;

use crate::pidfile::{delete_pidfile, read_pidfile, write_pidfile};
use crate::process::{pid_exists, terminate, Outcome, Termination};

/// Single-instance guard backed by a PID file.
///
/// `acquire` runs before the listener is bound and clears out any previous
/// instance; `publish` records our PID once the bind succeeded; `release`
/// removes the file again. Release is idempotent and runs on drop.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    pid: u32,
    published: bool,
    released: bool,
}

impl InstanceGuard {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, HotcastError> {
        Self::acquire_with(path, Termination::default())
    }

    pub fn acquire_with(path: impl Into<PathBuf>, termination: Termination) -> Result<Self, HotcastError> {
        let path = path.into();
        let pid = std::process::id();

        match read_pidfile(&path) {
            Ok(prior) if prior != pid && pid_exists(prior) => {
                tracing::info!("Instance {} from {} is still running, stopping it", prior, path.display());
                match terminate(prior, termination) {
                    Ok(Outcome::Killed) => tracing::warn!("Instance {} had to be killed", prior),
                    Ok(_) => tracing::info!("Instance {} stopped", prior),
                    Err(e) => tracing::warn!("Could not stop instance {}: {}", prior, e),
                }
            }
            Ok(prior) => tracing::debug!("Removing stale PID file for {}", prior),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Discarding unreadable PID file {}: {}", path.display(), e),
        }

        delete_pidfile(&path)
            .map_err(|e| HotcastError::Lifecycle(format!("cannot remove {}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            pid,
            published: false,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Records our PID. Call after the listener is bound.
    pub fn publish(&mut self) -> Result<(), HotcastError> {
        write_pidfile(&self.path, self.pid)
            .map_err(|e| HotcastError::Lifecycle(format!("cannot write {}: {}", self.path.display(), e)))?;
        self.published = true;
        tracing::debug!("Wrote PID {} to {}", self.pid, self.path.display());
        Ok(())
    }

    /// Removes the PID file if it still names us. A file rewritten by a
    /// newer instance is left alone.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if !self.published {
            return;
        }

        match read_pidfile(&self.path) {
            Ok(pid) if pid == self.pid => {
                if let Err(e) = delete_pidfile(&self.path) {
                    tracing::warn!("Cannot remove {}: {}", self.path.display(), e);
                }
            }
            Ok(other) => tracing::debug!("PID file now belongs to {}, leaving it", other),
            Err(_) => {}
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Stops the instance recorded in `path`, as `hotcast stop` does.
///
/// Returns the PID that was stopped, or `None` when nothing was running.
pub fn stop_instance(path: &Path, termination: Termination) -> Result<Option<u32>, HotcastError> {
    let pid = match read_pidfile(path) {
        Ok(pid) => pid,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HotcastError::Lifecycle(format!("cannot read {}: {}", path.display(), e))),
    };

    let stopped = if pid_exists(pid) {
        terminate(pid, termination)
            .map_err(|e| HotcastError::Lifecycle(format!("cannot stop instance {}: {}", pid, e)))?;
        Some(pid)
    } else {
        None
    };
    delete_pidfile(path)?;
    Ok(stopped)
}

//! # hotcast-transport: Keep-Alive
//!
//! Idle SSE streams get cut by proxies and browsers. A `ping` event on a
//! fixed cadence keeps them open and flushes out dead peers.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Body of a `ping` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ping {
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Ping {
    pub fn now() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { timestamp }
    }
}

/// Monotonic deadline tracker. Checked every tick, fires at most once per
/// interval however fast the loop spins.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    interval: Duration,
    deadline: Instant,
}

impl KeepAlive {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            deadline: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns a ping when the deadline has passed and re-arms it from `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Ping> {
        if now < self.deadline {
            return None;
        }
        self.deadline = now + self.interval;
        Some(Ping::now())
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::new(KEEP_ALIVE_INTERVAL, Instant::now())
    }
}

use std::io::Write;

use hotcast_codec::SseFrame;
use hotcast_core::{Connection, HotcastError, Registry};
use serde::Serialize;

/// Result of one fan-out.
#[derive(Debug)]
pub struct BroadcastReport<S> {
    pub delivered: usize,
    /// Connections whose write failed. Already unlinked from the registry;
    /// dropping them closes their sockets.
    pub pruned: Vec<Connection<S>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub events: u64,
    pub frames_delivered: u64,
    pub connections_pruned: u64,
}

/// Writes SSE frames to every registered subscriber.
#[derive(Debug, Default)]
pub struct Broadcaster {
    stats: BroadcastStats,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> BroadcastStats {
        self.stats
    }

    /// Frames `payload` under `event` and writes it to every connection.
    ///
    /// A failed write (including a socket buffer that is full) costs only
    /// that connection. Serialization errors are returned before any
    /// connection is touched.
    pub fn broadcast<S, P>(
        &mut self,
        registry: &mut Registry<S>,
        event: &str,
        payload: &P,
    ) -> Result<BroadcastReport<S>, HotcastError>
    where
        S: Write,
        P: Serialize + ?Sized,
    {
        let frame = SseFrame::new(event, payload)?;

        let mut delivered = 0;
        let pruned = registry.prune_with(|connection| {
            match write_frame(connection.stream_mut(), &frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    tracing::debug!("Dropping {} after failed '{}' write: {}", connection.id(), event, e);
                    false
                }
            }
        });

        self.stats.events += 1;
        self.stats.frames_delivered += delivered as u64;
        self.stats.connections_pruned += pruned.len() as u64;

        Ok(BroadcastReport { delivered, pruned })
    }
}

fn write_frame<S: Write>(stream: &mut S, frame: &SseFrame) -> std::io::Result<()> {
    stream.write_all(frame.as_bytes())?;
    stream.flush()
}

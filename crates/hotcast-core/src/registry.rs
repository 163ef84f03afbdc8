use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Opaque identity of an accepted socket, derived from its poll token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, request header block not yet complete.
    Accepted,
    /// SSE headers written; the socket receives broadcasts.
    Upgraded,
    /// Unlinked from the registry and about to be closed.
    Closing,
}

/// One accepted client socket.
///
/// Dropping a `Connection` drops the stream and therefore closes it.
#[derive(Debug)]
pub struct Connection<S> {
    id: ConnectionId,
    state: ConnectionState,
    created_at: Instant,
    stream: S,
}

impl<S> Connection<S> {
    pub fn new(id: ConnectionId, stream: S) -> Self {
        Self {
            id,
            state: ConnectionState::Accepted,
            created_at: Instant::now(),
            stream,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn mark_upgraded(&mut self) {
        self.state = ConnectionState::Upgraded;
    }

    pub fn mark_closing(&mut self) {
        self.state = ConnectionState::Closing;
    }
}

/// The set of live SSE subscribers.
///
/// The registry is the sole owner of its connections. Anything removed is
/// handed back by value so the caller decides how the socket is closed.
#[derive(Debug)]
pub struct Registry<S> {
    connections: HashMap<ConnectionId, Connection<S>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Inserts an upgraded connection. Returns the entry it displaced, if any.
    pub fn insert(&mut self, mut connection: Connection<S>) -> Option<Connection<S>> {
        connection.mark_upgraded();
        self.connections.insert(connection.id(), connection)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<S>> {
        self.connections.remove(&id).map(|mut connection| {
            connection.mark_closing();
            connection
        })
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<S>> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Snapshot of the current identities, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Visits every connection once and unlinks the ones `keep` rejects.
    ///
    /// The walk runs over a snapshot of identities, so removing the entry
    /// being visited never skips or repeats another one.
    pub fn prune_with<F>(&mut self, mut keep: F) -> Vec<Connection<S>>
    where
        F: FnMut(&mut Connection<S>) -> bool,
    {
        let mut pruned = Vec::new();
        for id in self.ids() {
            let Some(connection) = self.connections.get_mut(&id) else {
                continue;
            };
            if !keep(connection) {
                if let Some(removed) = self.remove(id) {
                    pruned.push(removed);
                }
            }
        }
        pruned
    }

    /// Unlinks every connection, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<Connection<S>> {
        self.connections
            .drain()
            .map(|(_, mut connection)| {
                connection.mark_closing();
                connection
            })
            .collect()
    }
}

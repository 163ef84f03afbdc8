use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotcast_codec::{parse_request_line, HeaderBlock, HeaderError, ProtocolHandler, Route, SSE_UPGRADE};
use hotcast_core::{
    Connection, ConnectionId, HotcastError, LoopPhase, LoopState, Registry, ReloadHandle, ServerConfig,
    ShutdownHandle, SignalFlags,
};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use serde::Serialize;

use crate::bootstrap::BoundListener;
use crate::broadcaster::{BroadcastStats, Broadcaster};
use crate::keepalive::KeepAlive;
use crate::reload::{ReloadPayload, ReloadQueue};
use crate::stream::{probe_liveness, ClientStream, Liveness};
use crate::trigger::TriggerBridge;

const LISTENER: Token = Token(0);
const EVENT_CAPACITY: usize = 256;
/// Readiness rounds a client gets to finish its request header block.
const MAX_HEADER_READS: u32 = 8;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A socket that has been accepted but has not finished its request yet.
struct Handshake {
    connection: Connection<ClientStream>,
    header: HeaderBlock,
    reads: u32,
}

enum Progress {
    Pending,
    Complete,
    Failed(&'static str),
}

/// Single-threaded readiness loop owning the listener and every client.
///
/// Each [`tick`](Reactor::tick) waits (bounded) for readiness, dispatches
/// accepts and reads, sweeps dead peers, then services keep-alive, reload
/// and shutdown requests in that order.
pub struct Reactor {
    poll: Poll,
    events: Events,
    listener: Option<TcpListener>,
    tls: Option<Arc<rustls::ServerConfig>>,
    local_addr: SocketAddr,
    poll_timeout: Duration,
    protocol: ProtocolHandler,
    broadcaster: Broadcaster,
    keep_alive: KeepAlive,
    trigger: TriggerBridge,
    reloads: ReloadQueue,
    registry: Registry<ClientStream>,
    handshakes: HashMap<Token, Handshake>,
    state: LoopState,
    next_token: usize,
}

impl Reactor {
    pub fn new(config: &ServerConfig, bound: BoundListener, flags: SignalFlags) -> Result<Self, HotcastError> {
        let poll = Poll::new()?;
        let local_addr = bound.local_addr();
        let (mut listener, tls) = bound.into_parts();
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            listener: Some(listener),
            tls,
            local_addr,
            poll_timeout: config.poll_timeout(),
            protocol: ProtocolHandler::from_config(config),
            broadcaster: Broadcaster::new(),
            keep_alive: KeepAlive::new(config.keep_alive_interval(), Instant::now()),
            trigger: TriggerBridge::new(config.trigger_file.clone()),
            reloads: ReloadQueue::new(),
            registry: Registry::new(),
            handshakes: HashMap::new(),
            state: LoopState::new(flags),
            next_token: 1,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn tls_active(&self) -> bool {
        self.tls.is_some()
    }

    pub fn phase(&self) -> LoopPhase {
        self.state.phase()
    }

    /// Number of upgraded subscribers.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pending_handshakes(&self) -> usize {
        self.handshakes.len()
    }

    pub fn broadcast_stats(&self) -> BroadcastStats {
        self.broadcaster.stats()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.state.flags().shutdown_handle()
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.state.flags().reload_handle()
    }

    /// Queues a reload for the next tick, merged with any other request
    /// arriving in the same iteration.
    pub fn request_reload(&mut self, payload: ReloadPayload) {
        self.reloads.request(payload);
    }

    /// Drives the loop until shutdown is requested, then closes everything.
    pub fn run(&mut self) -> Result<(), HotcastError> {
        tracing::info!(
            "Serving SSE on {}{} (tls: {})",
            self.local_addr,
            self.protocol.sse_path(),
            self.tls_active()
        );
        tracing::debug!(
            "Keep-alive every {:?}, watching {}",
            self.keep_alive.interval(),
            self.trigger.path().display()
        );
        let outcome = loop {
            match self.tick() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => {
                    tracing::error!("Event loop aborted: {}", e);
                    break Err(e);
                }
            }
        };
        self.shutdown();
        outcome
    }

    /// Runs one iteration. Returns `Ok(false)` once the loop should exit.
    pub fn tick(&mut self) -> Result<bool, HotcastError> {
        if !self.state.is_running() {
            return Ok(false);
        }

        self.state.enter(LoopPhase::Polling);
        if let Err(e) = self.poll.poll(&mut self.events, Some(self.poll_timeout)) {
            if e.kind() != io::ErrorKind::Interrupted {
                return Err(e.into());
            }
            self.events.clear();
        }

        self.state.enter(LoopPhase::Dispatching);
        let ready: Vec<Token> = self.events.iter().map(|event| event.token()).collect();
        for token in ready {
            if token == LISTENER {
                self.accept_pending();
            } else if self.handshakes.contains_key(&token) {
                self.advance_handshake(token);
            } else {
                self.check_subscriber(ConnectionId(token.0));
            }
        }

        let now = Instant::now();
        self.sweep(now);

        if let Some(ping) = self.keep_alive.poll(now) {
            match self.broadcast("ping", &ping) {
                Ok(delivered) => tracing::debug!("Ping delivered to {} subscriber(s)", delivered),
                Err(e) => tracing::warn!("Ping broadcast failed: {}", e),
            }
        }

        if self.state.flags().take_reload() {
            tracing::info!("Reload requested by signal");
            self.reloads.request(ReloadPayload::everything());
        }
        if let Some(payload) = self.trigger.poll() {
            self.reloads.request(payload);
        }
        if let Some(payload) = self.reloads.take() {
            self.broadcast_reload(payload);
        }

        self.state.enter(LoopPhase::Idle);
        if self.state.flags().shutdown_requested() {
            tracing::info!("Shutdown requested");
            self.state.begin_shutdown();
            return Ok(false);
        }
        Ok(true)
    }

    /// Sends `payload` as `event` to every subscriber, closing the ones
    /// whose write fails. Returns how many received the frame.
    pub fn broadcast<P: Serialize + ?Sized>(&mut self, event: &str, payload: &P) -> Result<usize, HotcastError> {
        let report = self.broadcaster.broadcast(&mut self.registry, event, payload)?;
        let pruned = report.pruned.len();
        for connection in report.pruned {
            self.close(connection);
        }
        if pruned > 0 {
            tracing::info!(
                "'{}' dropped {} dead subscriber(s), {} remaining",
                event,
                pruned,
                self.registry.len()
            );
        }
        Ok(report.delivered)
    }

    /// Closes every connection and the listener. Returns how many client
    /// sockets were closed; calling it again closes nothing.
    pub fn shutdown(&mut self) -> usize {
        if self.state.phase() == LoopPhase::Stopped {
            return 0;
        }
        self.state.begin_shutdown();

        let mut closed = 0;
        for connection in self.registry.drain() {
            self.close(connection);
            closed += 1;
        }
        let pending: Vec<Handshake> = self.handshakes.drain().map(|(_, handshake)| handshake).collect();
        for handshake in pending {
            self.close(handshake.connection);
            closed += 1;
        }
        if let Some(mut listener) = self.listener.take() {
            let _ = self.poll.registry().deregister(&mut listener);
        }

        self.state.enter(LoopPhase::Stopped);
        tracing::info!("Event loop stopped, closed {} connection(s)", closed);
        closed
    }

    fn broadcast_reload(&mut self, payload: ReloadPayload) {
        match self.broadcast("reload", &payload) {
            Ok(delivered) => {
                tracing::info!("Reload {:?} sent to {} subscriber(s)", payload.files, delivered)
            }
            Err(e) => tracing::error!("Reload broadcast failed: {}", e),
        }
    }

    fn accept_pending(&mut self) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };
            match listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    return;
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1).max(1);

        let mut stream = match ClientStream::accept(stream, self.tls.as_ref()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Rejected {}: {}", peer, e);
                return;
            }
        };
        if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
            tracing::warn!("Cannot watch {}: {}", peer, e);
            return;
        }

        let id = ConnectionId(token.0);
        tracing::debug!("Accepted {} from {}", id, peer);
        self.handshakes.insert(
            token,
            Handshake {
                connection: Connection::new(id, stream),
                header: HeaderBlock::new(),
                reads: 0,
            },
        );
    }

    fn advance_handshake(&mut self, token: Token) {
        let Some(handshake) = self.handshakes.get_mut(&token) else {
            return;
        };
        handshake.reads += 1;

        let failure = match read_header(handshake) {
            Progress::Complete => None,
            Progress::Pending if handshake.reads < MAX_HEADER_READS => return,
            Progress::Pending => Some("request incomplete after retry budget"),
            Progress::Failed(reason) => Some(reason),
        };

        let Some(handshake) = self.handshakes.remove(&token) else {
            return;
        };
        match failure {
            None => self.respond(handshake),
            Some(reason) => {
                tracing::debug!("Dropping {}: {}", handshake.connection.id(), reason);
                self.close(handshake.connection);
            }
        }
    }

    fn respond(&mut self, handshake: Handshake) {
        let Handshake {
            mut connection, header, ..
        } = handshake;
        let request = parse_request_line(&header.request_line());

        match self.protocol.route(&request) {
            Route::Upgrade => {
                if let Err(e) = write_all_flush(connection.stream_mut(), SSE_UPGRADE.as_bytes()) {
                    tracing::debug!("Upgrade of {} failed: {}", connection.id(), e);
                    self.close(connection);
                    return;
                }
                let id = connection.id();
                let peer = connection.stream().peer_addr().ok();
                if let Some(displaced) = self.registry.insert(connection) {
                    tracing::warn!("{} replaced a live subscriber with the same id", id);
                    self.close(displaced);
                }
                tracing::info!("{} subscribed from {:?} ({} active)", id, peer, self.registry.len());
            }
            Route::Respond(response) => {
                if let Err(e) = write_all_flush(connection.stream_mut(), &response.to_bytes()) {
                    tracing::debug!("Response to {} failed: {}", connection.id(), e);
                }
                tracing::debug!(
                    "{} {} {} -> {}",
                    connection.id(),
                    request.method,
                    request.path,
                    response.status
                );
                self.close(connection);
            }
        }
    }

    fn check_subscriber(&mut self, id: ConnectionId) {
        let Some(connection) = self.registry.get_mut(id) else {
            return;
        };
        if probe_liveness(connection.stream_mut()) == Liveness::EndOfStream {
            if let Some(connection) = self.registry.remove(id) {
                self.close(connection);
                tracing::info!("{} disconnected ({} active)", id, self.registry.len());
            }
        }
    }

    /// Prunes subscribers that hung up without a readiness event reaching
    /// us, and handshakes that outlived their deadline.
    fn sweep(&mut self, now: Instant) {
        let gone = self
            .registry
            .prune_with(|connection| probe_liveness(connection.stream_mut()) == Liveness::Alive);
        if !gone.is_empty() {
            let count = gone.len();
            for connection in gone {
                self.close(connection);
            }
            tracing::info!("Swept {} closed subscriber(s), {} active", count, self.registry.len());
        }

        let expired: Vec<Token> = self
            .handshakes
            .iter()
            .filter(|(_, handshake)| now.saturating_duration_since(handshake.connection.created_at()) >= HANDSHAKE_TIMEOUT)
            .map(|(token, _)| *token)
            .collect();
        for token in expired {
            if let Some(handshake) = self.handshakes.remove(&token) {
                tracing::debug!("Dropping {}: handshake timed out", handshake.connection.id());
                self.close(handshake.connection);
            }
        }
    }

    fn close(&mut self, mut connection: Connection<ClientStream>) {
        connection.mark_closing();
        let _ = self.poll.registry().deregister(connection.stream_mut());
        connection.stream_mut().close();
        tracing::trace!("Closed {} after {:?}", connection.id(), connection.age());
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_header(handshake: &mut Handshake) -> Progress {
    let mut buf = [0u8; 1024];
    loop {
        match handshake.connection.stream_mut().read(&mut buf) {
            Ok(0) => return Progress::Failed("peer closed before completing its request"),
            Ok(n) => match handshake.header.feed(&buf[..n]) {
                Ok(true) => return Progress::Complete,
                Ok(false) => continue,
                Err(HeaderError::TooLarge) => return Progress::Failed("request header block too large"),
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Progress::Pending,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Progress::Failed("read error during handshake"),
        }
    }
}

fn write_all_flush<W: Write>(stream: &mut W, bytes: &[u8]) -> io::Result<()> {
    stream.write_all(bytes)?;
    stream.flush()
}

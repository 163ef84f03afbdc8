use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;

use mio::event::Source;
use mio::net::TcpStream;
use mio::{Interest, Token};
use rustls::{ServerConnection, StreamOwned};

/// An accepted client socket, optionally wrapped in a TLS session.
///
/// Both variants are non-blocking: reads and writes surface `WouldBlock`
/// instead of parking the reactor thread. For TLS the handshake is driven
/// implicitly by the first reads.
#[derive(Debug)]
pub enum ClientStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl ClientStream {
    pub fn accept(stream: TcpStream, tls: Option<&Arc<rustls::ServerConfig>>) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        match tls {
            None => Ok(ClientStream::Plain(stream)),
            Some(config) => {
                let session = ServerConnection::new(Arc::clone(config)).map_err(io::Error::other)?;
                Ok(ClientStream::Tls(Box::new(StreamOwned::new(session, stream))))
            }
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, ClientStream::Tls(_))
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            ClientStream::Plain(stream) => stream,
            ClientStream::Tls(tls) => &tls.sock,
        }
    }

    fn tcp_mut(&mut self) -> &mut TcpStream {
        match self {
            ClientStream::Plain(stream) => stream,
            ClientStream::Tls(tls) => &mut tls.sock,
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// Best-effort orderly close. For TLS a close_notify alert is queued and
    /// flushed if the socket accepts it.
    pub fn close(&mut self) {
        if let ClientStream::Tls(tls) = self {
            let tls = &mut **tls;
            tls.conn.send_close_notify();
            while tls.conn.wants_write() {
                match tls.conn.write_tls(&mut tls.sock) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
        let _ = self.tcp().shutdown(Shutdown::Both);
    }
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ClientStream::Plain(stream) => stream.read(buf),
            ClientStream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ClientStream::Plain(stream) => stream.write(buf),
            ClientStream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ClientStream::Plain(stream) => stream.flush(),
            ClientStream::Tls(tls) => tls.flush(),
        }
    }
}

impl Source for ClientStream {
    fn register(&mut self, registry: &mio::Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.tcp_mut().register(registry, token, interests)
    }

    fn reregister(&mut self, registry: &mio::Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.tcp_mut().reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        self.tcp_mut().deregister(registry)
    }
}

/// Outcome of draining whatever a subscriber sent us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    EndOfStream,
}

/// Reads and discards pending input, reporting whether the peer has gone.
///
/// Subscribers never send anything meaningful after the upgrade, so every
/// byte is dropped. Reads are capped per call so one chatty client cannot
/// hold the loop.
pub fn probe_liveness<R: Read>(stream: &mut R) -> Liveness {
    const MAX_READS: usize = 16;
    let mut scratch = [0u8; 512];
    for _ in 0..MAX_READS {
        match stream.read(&mut scratch) {
            Ok(0) => return Liveness::EndOfStream,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Liveness::Alive,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Liveness::EndOfStream,
        }
    }
    Liveness::Alive
}

use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotcast_core::{HotcastError, ServerConfig};
use mio::net::TcpListener;
use socket2::{Domain, Protocol, Socket, Type};

const LISTEN_BACKLOG: i32 = 1024;

/// A bound, non-blocking listener and the TLS settings accepted sockets
/// are wrapped with.
#[derive(Debug)]
pub struct BoundListener {
    listener: TcpListener,
    tls: Option<Arc<rustls::ServerConfig>>,
    local_addr: SocketAddr,
}

impl BoundListener {
    pub fn tls_active(&self) -> bool {
        self.tls.is_some()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_parts(self) -> (TcpListener, Option<Arc<rustls::ServerConfig>>) {
        (self.listener, self.tls)
    }
}

/// Binds the listening socket: TLS when certificate material is present,
/// plain TCP otherwise or when TLS setup fails.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    host: String,
    port: u16,
    cert: PathBuf,
    key: PathBuf,
}

impl Bootstrapper {
    pub fn new(config: &ServerConfig) -> Self {
        let (cert, key) = config.tls_paths();
        Self {
            host: config.host.clone(),
            port: config.port,
            cert,
            key,
        }
    }

    pub fn bind(&self) -> Result<BoundListener, HotcastError> {
        let addr = self.resolve()?;

        if self.cert.is_file() && self.key.is_file() {
            match self.bind_tls(addr) {
                Ok(bound) => {
                    tracing::info!("Listening on https://{} (TLS)", bound.local_addr);
                    return Ok(bound);
                }
                Err(e) => {
                    tracing::warn!("TLS listener unavailable on {}: {}. Falling back to plain TCP.", addr, e);
                }
            }
        } else {
            tracing::debug!(
                "No certificate pair at {} / {}, serving plain TCP",
                self.cert.display(),
                self.key.display()
            );
        }

        let listener = bind_socket(addr).map_err(|e| HotcastError::bind_at(addr, e))?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on http://{}", local_addr);
        Ok(BoundListener {
            listener,
            tls: None,
            local_addr,
        })
    }

    fn resolve(&self) -> Result<SocketAddr, HotcastError> {
        let display = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| HotcastError::bind(display.clone(), e))?
            .next()
            .ok_or_else(|| {
                HotcastError::bind(
                    display,
                    std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "host resolved to no address"),
                )
            })
    }

    fn bind_tls(&self, addr: SocketAddr) -> Result<BoundListener, HotcastError> {
        let tls = load_tls_config(&self.cert, &self.key)?;
        let listener = bind_socket(addr).map_err(|e| HotcastError::bind_at(addr, e))?;
        let local_addr = listener.local_addr()?;
        Ok(BoundListener {
            listener,
            tls: Some(tls),
            local_addr,
        })
    }
}

fn bind_socket(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(TcpListener::from_std(socket.into()))
}

/// Builds a rustls server configuration from a PEM certificate chain and key.
pub fn load_tls_config(cert: &Path, key: &Path) -> Result<Arc<rustls::ServerConfig>, HotcastError> {
    let tls_err = |what: &str, path: &Path, e: &dyn std::fmt::Display| {
        HotcastError::Tls(format!("{} {}: {}", what, path.display(), e))
    };

    let cert_file = File::open(cert).map_err(|e| tls_err("cannot open", cert, &e))?;
    let chain = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_err("cannot parse", cert, &e))?;
    if chain.is_empty() {
        return Err(HotcastError::Tls(format!("no certificate found in {}", cert.display())));
    }

    let key_file = File::open(key).map_err(|e| tls_err("cannot open", key, &e))?;
    let private_key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|e| tls_err("cannot parse", key, &e))?
        .ok_or_else(|| HotcastError::Tls(format!("no private key found in {}", key.display())))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| HotcastError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(chain, private_key)
        .map_err(|e| HotcastError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

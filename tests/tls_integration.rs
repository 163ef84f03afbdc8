//! # TLS Integration Tests
//!
//! Runs the reactor with the bundled test certificate and talks to it
//! through a verifying rustls client, so the handshake, the upgrade and
//! broadcast frames all cross a real TLS session.

mod common;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{RunningServer, SseClient, IO_TIMEOUT};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

fn testdata() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("crates/hotcast-transport/testdata")
}

fn tls_server() -> RunningServer {
    RunningServer::start_with(|config| {
        config.cert_dir = testdata();
        config.domain = "localhost".to_string();
    })
}

fn tls_connect(addr: SocketAddr) -> StreamOwned<ClientConnection, TcpStream> {
    let pem = std::fs::read(testdata().join("ca.crt")).unwrap();
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.unwrap()).unwrap();
    }

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connection = ClientConnection::new(Arc::new(config), ServerName::try_from("localhost").unwrap()).unwrap();

    let socket = TcpStream::connect(addr).unwrap();
    socket.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    StreamOwned::new(connection, socket)
}

/// Verifies a certificate pair on disk switches the listener to TLS and a
/// verifying client can subscribe and receive a reload.
#[test]
fn test_tls_subscriber_receives_reload() {
    let server = tls_server();
    assert!(server.tls, "certificate pair should enable TLS");

    let mut stream = tls_connect(server.addr);
    stream.write_all(b"GET /sse HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    let mut client = SseClient::over(stream);
    assert!(client.headers.contains("Content-Type: text/event-stream"));

    server.reload.request();
    assert_eq!(client.next_frame(), "event: reload\ndata: {\"files\":[\"*\"]}\n\n");

    server.stop().unwrap();
    assert_eq!(client.read_to_close().unwrap(), "", "close_notify ends the stream cleanly");
}

/// Verifies the health probe is served over TLS too.
#[test]
fn test_tls_health_probe() {
    let server = tls_server();

    let mut stream = tls_connect(server.addr);
    stream.write_all(b"GET /sse/healthz HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("OK"));
}

/// Verifies a plaintext client against a TLS listener is dropped instead of
/// upgraded.
#[test]
fn test_plaintext_client_is_rejected_by_tls_listener() {
    let server = tls_server();

    let mut socket = TcpStream::connect(server.addr).unwrap();
    socket.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    socket.write_all(b"GET /sse HTTP/1.1\r\n\r\n").unwrap();

    let mut reply = Vec::new();
    let _ = socket.read_to_end(&mut reply);
    assert!(
        !String::from_utf8_lossy(&reply).contains("text/event-stream"),
        "plaintext request must not be upgraded"
    );
}

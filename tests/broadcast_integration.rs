//! # Broadcast Integration Tests
//!
//! Drives a live reactor over loopback sockets: upgrade handshake, reload
//! fan-out from every input, probe routes, disconnect handling and
//! shutdown.

mod common;

use std::time::{Duration, Instant};

use common::{request, RunningServer, SseClient};
use hotcast_transport::{write_trigger_file, ReloadPayload};

/// Verifies the upgrade response carries the streaming and CORS headers
/// browsers and proxies need.
#[test]
fn test_upgrade_sends_event_stream_headers() {
    let t = Instant::now();
    let server = RunningServer::start();

    let client = SseClient::connect(server.addr);

    assert!(client.headers.starts_with("HTTP/1.1 200 OK\r\n"));
    for header in [
        "Content-Type: text/event-stream",
        "Cache-Control: no-cache",
        "Connection: keep-alive",
        "Access-Control-Allow-Origin: *",
        "X-Accel-Buffering: no",
    ] {
        assert!(client.headers.contains(header), "missing {header}: {}", client.headers);
    }
    assert!(!client.headers.contains("Content-Length"), "an event stream has no length");

    println!("test_upgrade_sends_event_stream_headers: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies that a trigger file reaches every subscriber exactly once and
/// is consumed.
#[test]
fn test_trigger_file_fans_out_to_all_subscribers() {
    let server = RunningServer::start();
    let mut clients: Vec<_> = (0..3).map(|_| SseClient::connect(server.addr)).collect();

    write_trigger_file(&server.config.trigger_file, &ReloadPayload::for_files(["app.js"])).unwrap();

    for client in &mut clients {
        assert_eq!(
            client.next_frame(),
            "event: reload\ndata: {\"files\":[\"app.js\"]}\n\n"
        );
    }
    assert!(!server.config.trigger_file.exists(), "trigger file must be deleted once read");
}

/// Verifies trigger metadata is forwarded alongside the file list.
#[test]
fn test_trigger_metadata_is_forwarded() {
    let server = RunningServer::start();
    let mut client = SseClient::connect(server.addr);

    std::fs::write(&server.config.trigger_file, r#"{"files": "main.css", "build": 12}"#).unwrap();

    assert_eq!(
        client.next_frame(),
        "event: reload\ndata: {\"files\":[\"main.css\"],\"build\":12}\n\n"
    );
}

/// Verifies an in-process reload request (the SIGHUP path) asks for a full
/// reload.
#[test]
fn test_reload_handle_requests_full_reload() {
    let server = RunningServer::start();
    let mut client = SseClient::connect(server.addr);

    server.reload.request();

    assert_eq!(client.next_frame(), "event: reload\ndata: {\"files\":[\"*\"]}\n\n");
}

/// Verifies the probe, preflight and fallback routes answer and close
/// without registering a subscriber.
#[test]
fn test_non_stream_routes_answer_and_close() {
    let server = RunningServer::start();

    let health = request(server.addr, "GET /sse/healthz HTTP/1.1\r\n\r\n");
    assert!(health.starts_with("HTTP/1.1 200 OK\r\n"), "{health}");
    assert!(health.ends_with("\r\n\r\nOK"));

    let preflight = request(server.addr, "OPTIONS /anything HTTP/1.1\r\n\r\n");
    assert!(preflight.starts_with("HTTP/1.1 204 No Content\r\n"), "{preflight}");
    assert!(preflight.contains("Access-Control-Allow-Origin: *"));

    let missing = request(server.addr, "GET /elsewhere HTTP/1.1\r\n\r\n");
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"), "{missing}");

    let post = request(server.addr, "POST /sse HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    assert!(post.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{post}");
    assert!(post.contains("Allow: GET, OPTIONS"));

    let mut client = SseClient::connect(server.addr);
    server.reload.request();
    assert!(client.next_frame().starts_with("event: reload\n"));
    server.stop().unwrap();
}

/// Verifies a subscriber that hangs up is dropped without affecting the
/// others.
#[test]
fn test_disconnected_subscriber_does_not_disturb_others() {
    let server = RunningServer::start();
    let gone = SseClient::connect(server.addr);
    let mut stays = SseClient::connect(server.addr);
    drop(gone);

    for round in 0..3 {
        write_trigger_file(
            &server.config.trigger_file,
            &ReloadPayload::for_files([format!("round-{round}.js")]),
        )
        .unwrap();
        assert_eq!(
            stays.next_frame(),
            format!("event: reload\ndata: {{\"files\":[\"round-{round}.js\"]}}\n\n")
        );
    }
}

/// Verifies the keep-alive ping fires on its interval with a millisecond
/// timestamp.
#[test]
fn test_keep_alive_ping_is_emitted() {
    let server = RunningServer::start_with(|config| config.keep_alive_secs = 1);
    let mut client = SseClient::connect(server.addr);

    let started = Instant::now();
    let frame = client.next_frame();

    assert!(frame.starts_with("event: ping\ndata: {\"timestamp\":"), "{frame}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// Verifies shutdown closes every subscriber and the loop returns cleanly.
#[test]
fn test_shutdown_closes_all_subscribers() {
    let t = Instant::now();
    let server = RunningServer::start();
    let addr = server.addr;
    let mut clients: Vec<_> = (0..4).map(|_| SseClient::connect(addr)).collect();

    server.stop().unwrap();

    for client in &mut clients {
        let rest = client.read_to_close().unwrap();
        assert!(rest.is_empty(), "no frame expected after shutdown, got {rest:?}");
    }
    assert!(std::net::TcpStream::connect(addr).is_err(), "listener must be closed");

    println!("test_shutdown_closes_all_subscribers: Testing Overhead = {:?}", t.elapsed());
}

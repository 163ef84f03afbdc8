//! Shared harness: a reactor running on a background thread, plus a
//! line-oriented SSE client.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hotcast_core::{HotcastError, ReloadHandle, ServerConfig, ShutdownHandle};
use hotcast_transport::HotcastServer;
use tempfile::TempDir;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RunningServer {
    pub addr: SocketAddr,
    pub tls: bool,
    pub config: ServerConfig,
    pub shutdown: ShutdownHandle,
    pub reload: ReloadHandle,
    thread: Option<JoinHandle<Result<(), HotcastError>>>,
    _dir: TempDir,
}

impl RunningServer {
    /// Ephemeral port, fast poll, runtime files inside a fresh temp dir.
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    pub fn start_with(customise: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig {
            port: 0,
            cert_dir: dir.path().join("certs"),
            pid_file: dir.path().join("hotcast.pid"),
            trigger_file: dir.path().join("hotcast.reload"),
            poll_timeout_ms: 20,
            ..ServerConfig::default()
        };
        customise(&mut config);

        let (tx, rx) = mpsc::channel();
        let server_config = config.clone();
        let thread = thread::spawn(move || {
            let mut reactor = HotcastServer::new(server_config).bind()?;
            tx.send((
                reactor.local_addr(),
                reactor.tls_active(),
                reactor.shutdown_handle(),
                reactor.reload_handle(),
            ))
            .unwrap();
            reactor.run()
        });
        let (addr, tls, shutdown, reload) = rx.recv_timeout(IO_TIMEOUT).expect("server failed to bind");

        Self {
            addr,
            tls,
            config,
            shutdown,
            reload,
            thread: Some(thread),
            _dir: dir,
        }
    }

    /// Requests shutdown and waits for the loop to return.
    pub fn stop(mut self) -> Result<(), HotcastError> {
        self.shutdown.request();
        self.thread.take().unwrap().join().unwrap()
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shutdown.request();
            let _ = thread.join();
        }
    }
}

/// Sends one raw request and returns everything the server writes before
/// closing.
pub fn request(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

pub struct SseClient<S: Read> {
    reader: BufReader<S>,
    pub headers: String,
}

impl SseClient<TcpStream> {
    /// Opens the default `/sse` stream and consumes the response headers.
    pub fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
        stream
            .write_all(b"GET /sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .unwrap();
        Self::over(stream)
    }
}

impl<S: Read> SseClient<S> {
    pub fn over(stream: S) -> Self {
        let mut reader = BufReader::new(stream);
        let mut headers = String::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).unwrap();
            assert!(n > 0, "stream closed inside the response headers: {headers:?}");
            headers.push_str(&line);
            if line == "\r\n" {
                return Self { reader, headers };
            }
        }
    }

    /// Next complete `event:`/`data:` frame, including its blank line.
    pub fn next_frame(&mut self) -> String {
        let mut frame = String::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).unwrap();
            assert!(n > 0, "stream closed mid-frame: {frame:?}");
            frame.push_str(&line);
            if line == "\n" {
                return frame;
            }
        }
    }

    /// Reads until the server closes. Returns the trailing bytes.
    pub fn read_to_close(&mut self) -> std::io::Result<String> {
        let mut rest = String::new();
        self.reader.read_to_string(&mut rest)?;
        Ok(rest)
    }
}

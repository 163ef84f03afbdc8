pub mod request;
pub mod sse;
pub mod templates;

pub use request::{parse_request_line, HeaderBlock, HeaderError, RequestLine};
pub use sse::SseFrame;
pub use templates::{Response, SSE_UPGRADE};

use hotcast_core::ServerConfig;

/// What to do with a fully read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Write the SSE header block and keep the socket as a subscriber.
    Upgrade,
    /// Write the response and close.
    Respond(Response),
}

impl Route {
    pub fn keeps_open(&self) -> bool {
        matches!(self, Route::Upgrade)
    }
}

/// Maps request lines onto the three routes the broadcaster serves.
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    sse_path: String,
    health_path: String,
}

impl ProtocolHandler {
    pub fn new(sse_path: impl Into<String>, health_path: impl Into<String>) -> Self {
        Self {
            sse_path: sse_path.into(),
            health_path: health_path.into(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.base_path.clone(), config.health_path())
    }

    pub fn sse_path(&self) -> &str {
        &self.sse_path
    }

    pub fn route(&self, request: &RequestLine) -> Route {
        match request.method.as_str() {
            "OPTIONS" => Route::Respond(Response::no_content()),
            "GET" if request.path == self.sse_path => Route::Upgrade,
            "GET" if request.path == self.health_path => Route::Respond(Response::health()),
            "GET" => Route::Respond(Response::not_found()),
            _ => Route::Respond(Response::method_not_allowed()),
        }
    }

    /// Routes a raw request line, for callers that have not parsed it yet.
    pub fn route_line(&self, line: &str) -> Route {
        self.route(&parse_request_line(line))
    }
}

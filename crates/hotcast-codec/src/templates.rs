//! Fixed response blocks written straight to the socket.

/// Header block that turns the exchange into an event stream. Nothing
/// follows it until the first broadcast.
pub const SSE_UPGRADE: &str = concat!(
    "HTTP/1.1 200 OK\r\n",
    "Content-Type: text/event-stream\r\n",
    "Cache-Control: no-cache\r\n",
    "Connection: keep-alive\r\n",
    "Access-Control-Allow-Origin: *\r\n",
    "Access-Control-Allow-Methods: GET,OPTIONS\r\n",
    "Access-Control-Allow-Headers: Content-Type\r\n",
    "X-Accel-Buffering: no\r\n",
    "\r\n",
);

/// A short, connection-closing HTTP/1.1 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn no_content() -> Self {
        Self::new(204, "No Content")
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET,OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method Not Allowed").header("Allow", "GET, OPTIONS")
    }

    pub fn health() -> Self {
        Self::new(200, "OK")
            .header("Content-Type", "text/plain")
            .body("OK")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
            .header("Content-Type", "text/plain")
            .body("Not Found")
    }

    /// Serialises the response, always closing the connection afterwards.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        out.push_str("Connection: close\r\n\r\n");
        out.push_str(&self.body);
        out.into_bytes()
    }
}

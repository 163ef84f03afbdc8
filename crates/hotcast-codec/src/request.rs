//! Just enough HTTP/1.1 request parsing to route three endpoints.

/// Upper bound on a request header block before the client is dropped.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
}

impl RequestLine {
    pub fn as_tuple(&self) -> (&str, &str) {
        (&self.method, &self.path)
    }
}

/// Splits a request line into method and path.
///
/// Never fails: a missing method reads as `GET`, a missing target as `/`.
/// Query string and fragment are stripped from the target.
pub fn parse_request_line(line: &str) -> RequestLine {
    let mut tokens = line.split_whitespace();
    let method = tokens.next().unwrap_or("GET").to_ascii_uppercase();
    let target = tokens.next().unwrap_or("/");

    RequestLine {
        method,
        path: target_path(target).unwrap_or(target).to_string(),
    }
}

/// Extracts the path component from an origin-form or absolute-form target.
///
/// A scheme separator only counts before the query or fragment, so URLs
/// carried in query parameters never redirect the path.
fn target_path(target: &str) -> Option<&str> {
    let head_end = target.find(['?', '#']).unwrap_or(target.len());
    let scheme_end = if target.starts_with('/') {
        None
    } else {
        target[..head_end].find("://")
    };
    let origin = match scheme_end {
        Some(scheme_end) => {
            let after_scheme = &target[scheme_end + 3..];
            match after_scheme.find(['/', '?', '#']) {
                Some(idx) if after_scheme[idx..].starts_with('/') => &after_scheme[idx..],
                _ => "/",
            }
        }
        None => target,
    };

    let end = origin.find(['?', '#']).unwrap_or(origin.len());
    let path = &origin[..end];
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    TooLarge,
}

/// Accumulates bytes from a non-blocking socket until the blank line that
/// ends a request header block.
#[derive(Debug, Default)]
pub struct HeaderBlock {
    buf: Vec<u8>,
    complete: bool,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes`. Returns `Ok(true)` once the terminator has been seen.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<bool, HeaderError> {
        if self.complete {
            return Ok(true);
        }
        let scan_from = self.buf.len().saturating_sub(3);
        self.buf.extend_from_slice(bytes);

        if find_terminator(&self.buf[scan_from..]).is_some() {
            self.complete = true;
            return Ok(true);
        }
        if self.buf.len() > MAX_HEADER_BYTES {
            return Err(HeaderError::TooLarge);
        }
        Ok(false)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// First line of the block, without its line ending.
    pub fn request_line(&self) -> String {
        let end = self
            .buf
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(self.buf.len());
        String::from_utf8_lossy(&self.buf[..end])
            .trim_end_matches('\r')
            .to_string()
    }
}

/// Position of the first empty line, accepting both CRLF and bare LF.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .or_else(|| buf.windows(2).position(|w| w == b"\n\n"))
}

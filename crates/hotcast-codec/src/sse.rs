use hotcast_core::HotcastError;
use serde::Serialize;

/// One `event:` / `data:` frame, already encoded for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    encoded: String,
}

impl SseFrame {
    /// Serialises `payload` as compact JSON and frames it under `event`.
    ///
    /// Line breaks in the event name are dropped so a frame can never be
    /// split into two events.
    pub fn new<P: Serialize + ?Sized>(event: &str, payload: &P) -> Result<Self, HotcastError> {
        let data = serde_json::to_string(payload)?;
        let event: String = event.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        Ok(Self {
            encoded: format!("event: {}\ndata: {}\n\n", event, data),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.encoded.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

//! Polled reload-signal file.
//!
//! External tools (file watchers, build scripts, the `hotcast notify`
//! command) drop a JSON document at a well-known path; the reactor picks it
//! up on its next tick, deletes it, and broadcasts a reload.
//!
//! Accepted shapes:
//! ```text
//! ["app.js", "app.css"]
//! {"files": ["app.js"], "build": 42}
//! {"reason": "manual"}            -> files defaults to ["*"]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::reload::{ReloadPayload, ALL_FILES};

#[derive(Debug, Clone)]
pub struct TriggerBridge {
    path: PathBuf,
}

impl TriggerBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consumes the trigger file if present.
    ///
    /// The file is removed even when it does not parse, so a bad document
    /// cannot re-trigger on every tick.
    pub fn poll(&self) -> Option<ReloadPayload> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Unreadable trigger file {}: {}", self.path.display(), e);
                self.discard();
                return None;
            }
        };
        self.discard();

        match parse_trigger(&raw) {
            Ok(payload) => {
                tracing::debug!("Trigger file requested reload of {:?}", payload.files);
                Some(payload)
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed trigger file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Cannot remove trigger file {}: {}", self.path.display(), e);
            }
        }
    }
}

pub fn parse_trigger(raw: &str) -> Result<ReloadPayload, serde_json::Error> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => Ok(ReloadPayload::for_files(string_items(items))),
        Value::Object(mut meta) => {
            let files = match meta.remove("files") {
                Some(Value::Array(items)) => string_items(items),
                Some(Value::String(single)) => vec![single],
                _ => vec![ALL_FILES.to_string()],
            };
            Ok(ReloadPayload { files, meta })
        }
        other => Err(serde::de::Error::custom(format!(
            "expected an array or object, found {}",
            type_name(&other)
        ))),
    }
}

fn string_items(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Atomically publishes a trigger document: write to a sibling temp file,
/// then rename over the target, so the reactor never reads a partial file.
pub fn write_trigger_file(path: &Path, payload: &ReloadPayload) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let body = serde_json::to_vec(payload)?;
    fs::write(&temp_path, body)?;
    fs::rename(&temp_path, path)
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wildcard entry meaning "reload everything".
pub const ALL_FILES: &str = "*";

/// Body of a `reload` event: the changed files plus any extra metadata the
/// producer attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadPayload {
    pub files: Vec<String>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl ReloadPayload {
    pub fn everything() -> Self {
        Self::for_files([ALL_FILES])
    }

    pub fn for_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            meta: Map::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn is_full_reload(&self) -> bool {
        self.files.iter().any(|f| f == ALL_FILES)
    }

    /// Folds another request into this one. A wildcard absorbs any file
    /// list; otherwise the lists are unioned. Later metadata wins.
    pub fn merge(&mut self, other: ReloadPayload) {
        if self.is_full_reload() || other.is_full_reload() {
            self.files = vec![ALL_FILES.to_string()];
        } else {
            for file in other.files {
                if !self.files.contains(&file) {
                    self.files.push(file);
                }
            }
        }
        self.meta.extend(other.meta);
    }
}

/// Reload requests gathered during one loop iteration.
///
/// However many sources ask within a tick, at most one `reload` event is
/// broadcast for it.
#[derive(Debug, Default)]
pub struct ReloadQueue {
    pending: Option<ReloadPayload>,
}

impl ReloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, payload: ReloadPayload) {
        match &mut self.pending {
            Some(pending) => pending.merge(payload),
            None => self.pending = Some(payload),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take(&mut self) -> Option<ReloadPayload> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_files_with_flattened_meta() {
        let payload = ReloadPayload::for_files(["app.js"]).with_meta("source", "watcher");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "files": ["app.js"], "source": "watcher" })
        );
    }

    #[test]
    fn wildcard_absorbs_file_lists() {
        let mut payload = ReloadPayload::for_files(["a.css"]);
        payload.merge(ReloadPayload::everything());
        assert_eq!(payload.files, vec!["*"]);

        payload.merge(ReloadPayload::for_files(["b.js"]));
        assert_eq!(payload.files, vec!["*"]);
    }

    #[test]
    fn queue_coalesces_requests_within_a_tick() {
        let mut queue = ReloadQueue::new();
        assert!(queue.take().is_none());

        queue.request(ReloadPayload::for_files(["a.js", "b.js"]));
        queue.request(ReloadPayload::for_files(["b.js", "c.js"]).with_meta("build", 7));
        assert!(queue.is_pending());

        let merged = queue.take().unwrap();
        assert_eq!(merged.files, vec!["a.js", "b.js", "c.js"]);
        assert_eq!(merged.meta.get("build"), Some(&json!(7)));
        assert!(queue.take().is_none());
    }
}

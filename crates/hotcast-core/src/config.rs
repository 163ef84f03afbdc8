use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HotcastError;

/// Runtime settings for one broadcaster instance.
///
/// Every field has a default, so a TOML file only needs to name the
/// values it overrides. The struct is frozen once the reactor starts.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path clients subscribe on. `<base_path>/healthz` is the probe route.
    pub base_path: String,
    /// Only used to derive `<cert_dir>/<domain>.crt` and `.key`.
    pub domain: String,
    pub cert_dir: PathBuf,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub pid_file: PathBuf,
    pub trigger_file: PathBuf,
    pub keep_alive_secs: u64,
    pub poll_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8089,
            base_path: "/sse".to_string(),
            domain: "localhost".to_string(),
            cert_dir: PathBuf::from("var/certs"),
            tls_cert: None,
            tls_key: None,
            pid_file: PathBuf::from("var/run/hotcast.pid"),
            trigger_file: PathBuf::from("var/run/hotcast.reload"),
            keep_alive_secs: 25,
            poll_timeout_ms: 200,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, HotcastError> {
        let config: Self = toml::from_str(raw).map_err(|e| HotcastError::Config(e.to_string()))?;
        config.validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, HotcastError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HotcastError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    /// Normalises the base path and rejects values the reactor cannot serve.
    pub fn validated(mut self) -> Result<Self, HotcastError> {
        if !self.base_path.starts_with('/') {
            return Err(HotcastError::Config(format!(
                "base_path must start with '/', got {:?}",
                self.base_path
            )));
        }
        while self.base_path.len() > 1 && self.base_path.ends_with('/') {
            self.base_path.pop();
        }
        if self.poll_timeout_ms == 0 {
            return Err(HotcastError::Config("poll_timeout_ms must be non-zero".into()));
        }
        if self.keep_alive_secs == 0 {
            return Err(HotcastError::Config("keep_alive_secs must be non-zero".into()));
        }
        if self.host.trim().is_empty() {
            return Err(HotcastError::Config("host must not be empty".into()));
        }
        Ok(self)
    }

    pub fn health_path(&self) -> String {
        if self.base_path == "/" {
            "/healthz".to_string()
        } else {
            format!("{}/healthz", self.base_path)
        }
    }

    /// Certificate and key locations, explicit paths winning over the
    /// `<cert_dir>/<domain>` convention.
    pub fn tls_paths(&self) -> (PathBuf, PathBuf) {
        let cert = self
            .tls_cert
            .clone()
            .unwrap_or_else(|| self.cert_dir.join(format!("{}.crt", self.domain)));
        let key = self
            .tls_key
            .clone()
            .unwrap_or_else(|| self.cert_dir.join(format!("{}.key", self.domain)));
        (cert, key)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum HotcastError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("cannot bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}

impl HotcastError {
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        HotcastError::Bind {
            addr: addr.into(),
            source,
        }
    }

    pub fn bind_at(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::bind(addr.to_string(), source)
    }
}

//! The `error` module defines the error type shared by every layer of the
//! benchmark, from configuration loading down to a single publish call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("remote command failed: {0}")]
    Remote(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} exited without reporting a result")]
    WorkerLost(&'static str),
}

impl BenchError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        BenchError::InvalidArgument(msg.into())
    }
}

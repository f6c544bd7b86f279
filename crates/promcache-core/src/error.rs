//! Error types for promcache.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The key has no usable entry; the caller must query the backing store.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Another caller's load did not complete within the wait bound.
    #[error("Pending load for {key} did not complete within {waited_ms}ms")]
    PendingTimeout { key: String, waited_ms: u64 },

    #[error("Malformed result: {0}")]
    MalformedResult(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller should query the backing store and merge the answer.
    pub fn requires_fetch(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }

    /// No condition raised by the cache terminates the process.
    pub fn is_fatal(&self) -> bool {
        false
    }
}

pub type Result<T> = std::result::Result<T, Error>;

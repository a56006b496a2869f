//! Error taxonomy. Only `LookupError` ever reaches a caller; store and
//! persistence failures are logged and absorbed inside the crate.

use std::time::Duration;

use thiserror::Error;

/// Errors returned from a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The selection did not survive sanitization. Render a neutral state.
    #[error("nothing to look up")]
    InvalidInput,

    /// Definitions were requested with a non-English source language.
    #[error("definitions are only available for English words (source language: {0})")]
    UnsupportedLanguage(String),

    /// Fetch failed, timed out, returned non-2xx, or sent an unreadable body.
    #[error("Connection error - please try again ({0})")]
    Network(String),
}

impl LookupError {
    /// Whether a user-initiated retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LookupError::Network(_))
    }
}

/// Failures of the network transport, before they are folded into
/// `LookupError::Network`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("relay failed: {0}")]
    Relay(String),

    #[error("response decode failed: {0}")]
    Decode(String),
}

impl From<TransportError> for LookupError {
    fn from(e: TransportError) -> Self {
        LookupError::Network(e.to_string())
    }
}

/// Durable key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistence failures. Never surfaced to lookup callers.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("cache encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Bootstrap failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("http client init failed: {0}")]
    HttpClient(String),

    #[error("invalid provider url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

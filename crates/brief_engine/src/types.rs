use std::fmt;
use std::io;

use thiserror::Error;

/// Transport-level failure of a remote brief call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteFailureKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    InvalidResponse,
    Network,
}

impl fmt::Display for RemoteFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailureKind::InvalidUrl => write!(f, "invalid url"),
            RemoteFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            RemoteFailureKind::Timeout => write!(f, "timeout"),
            RemoteFailureKind::InvalidResponse => write!(f, "invalid response"),
            RemoteFailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache directory missing or not writable: {0}")]
    CacheDir(String),
    #[error("cache file is not valid json: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("generation queue must be created inside a tokio runtime")]
    NoRuntime,
}

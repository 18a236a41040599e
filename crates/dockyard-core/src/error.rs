//! Error types for Dockyard.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The server answered with a non-success status.
    Status {
        code: u16,
        reason: String,
        /// Response body, `None` when it could not be read.
        body: Option<String>,
    },
    Timeout,
    Network,
    Other,
}

/// A failed remote call, normalised away from the HTTP library's error types.
#[derive(Debug, Clone, Error)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub method: Option<String>,
    pub url: Option<String>,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            url: None,
            message: message.into(),
        }
    }

    pub fn status(code: u16, reason: impl Into<String>, body: Option<String>) -> Self {
        let reason = reason.into();
        Self::new(
            TransportErrorKind::Status {
                code,
                reason: reason.clone(),
                body,
            },
            format!("server responded with {} {}", code, reason),
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    /// Attach the request that failed.
    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.url = Some(url.into());
        self
    }

    /// `"<METHOD> <url>"` when the request is known.
    pub fn request_line(&self) -> Option<String> {
        match (&self.method, &self.url) {
            (Some(method), Some(url)) => Some(format!("{} {}", method, url)),
            (None, Some(url)) => Some(url.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

//! Turns errors into one-line diagnostics.

use derive_more::Display;
use std::fmt;

use crate::error::{Error, TransportErrorKind};

/// Response bodies longer than this are cut in diagnostics.
pub const MAX_BODY_CHARS: usize = 500;

/// Coarse failure category, decided once per error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[display("network error")]
    Network,
    #[display("timeout")]
    Timeout,
    #[display("file system error")]
    Filesystem,
    /// The service answered with this HTTP status.
    #[display("build service error ({_0})")]
    Remote(u16),
    #[display("unexpected error")]
    Unexpected,
}

/// Classified error ready to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub line: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Classify an error and render it as a single ` | `-separated line.
pub fn classify(err: &Error) -> Diagnostic {
    match err {
        Error::Transport(t) => {
            let mut parts = vec![t.message.clone()];
            let kind = match &t.kind {
                TransportErrorKind::Status { code, reason, body } => {
                    parts.push(format!("Status: {} {}", code, reason).trim_end().to_string());
                    if let Some(request) = t.request_line() {
                        parts.push(format!("URL: {}", request));
                    }
                    if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
                        parts.push(format!("Response: {}", truncate_body(body)));
                    }
                    ErrorKind::Remote(*code)
                }
                TransportErrorKind::Timeout => {
                    parts.push("Request timed out".to_string());
                    if let Some(request) = t.request_line() {
                        parts.push(format!("URL: {}", request));
                    }
                    ErrorKind::Timeout
                }
                TransportErrorKind::Network => {
                    if let Some(request) = t.request_line() {
                        parts.push(format!("URL: {}", request));
                    }
                    ErrorKind::Network
                }
                TransportErrorKind::Other => ErrorKind::Unexpected,
            };
            Diagnostic {
                kind,
                line: parts.join(" | "),
            }
        }
        Error::Filesystem(e) => Diagnostic {
            kind: ErrorKind::Filesystem,
            line: e.to_string(),
        },
        other => Diagnostic {
            kind: ErrorKind::Unexpected,
            line: other.to_string(),
        },
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

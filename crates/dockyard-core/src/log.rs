//! Build log events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build::BuildStatus;
use crate::id::BuildId;

/// Channel a log line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogChannel {
    Stdout,
    Stderr,
    /// Messages from the build service itself.
    Info,
}

/// One server-pushed log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub image_build_id: BuildId,
    pub timestamp: DateTime<Utc>,
    pub stream: LogChannel,
    pub message: String,
    /// Strictly increasing per build.
    pub sequence_number: u64,
    /// Status of the build when the line was emitted.
    pub build_status: BuildStatus,
}

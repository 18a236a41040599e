//! Build requests as sent over the wire and build state as reported back.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::id::{BuildId, ClientKey};

/// Status of a remote image build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    /// Accepted, waiting for a builder.
    Pending,
    /// A builder is working on it.
    Processing,
    Completed,
    Failed,
    Canceled,
    /// A status this client does not know about.
    Unknown(String),
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Completed | BuildStatus::Failed | BuildStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Processing => "processing",
            BuildStatus::Completed => "completed",
            BuildStatus::Failed => "failed",
            BuildStatus::Canceled => "canceled",
            BuildStatus::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for BuildStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "pending" | "enqueued" => BuildStatus::Pending,
            "processing" | "in_progress" | "building" => BuildStatus::Processing,
            "completed" | "succeeded" => BuildStatus::Completed,
            "failed" => BuildStatus::Failed,
            "canceled" | "cancelled" | "canceling" => BuildStatus::Canceled,
            other => BuildStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        BuildStatus::from(raw.as_str())
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about one image build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub id: BuildId,
    /// Key of the image request this build was created for.
    pub key: Option<ClientKey>,
    pub name: Option<String>,
    pub status: BuildStatus,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub finished_at: Option<String>,
}

impl BuildInfo {
    pub fn new(id: impl Into<BuildId>, status: BuildStatus) -> Self {
        Self {
            id: id.into(),
            key: None,
            name: None,
            status,
            error_message: None,
            created_at: None,
            updated_at: None,
            finished_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Name shown in front of every console line for this build.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() && name != "default" => {
                format!("{} ({})", name, self.id)
            }
            _ => self.id.to_string(),
        }
    }
}

/// The server's view of a submitted application version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationVersionBuildInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    /// One build per submitted image, keyed by the image's client key.
    pub image_builds: BTreeMap<ClientKey, BuildInfo>,
}

/// One image, ready to be sent.
#[derive(Debug, Clone)]
pub struct ImageBuildBundle {
    pub key: ClientKey,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Gzipped tar of the build context.
    pub context: Bytes,
    pub function_names: Vec<String>,
}

/// All images of an application version, ready to be sent.
#[derive(Debug, Clone)]
pub struct ApplicationVersionBuildBundle {
    pub name: String,
    pub version: String,
    pub images: Vec<ImageBuildBundle>,
}

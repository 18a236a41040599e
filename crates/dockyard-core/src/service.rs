//! Build service trait.
//!
//! A build service accepts application version builds and reports on them
//! (the hosted image builder, or a fake in tests).

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;
use crate::build::{ApplicationVersionBuildBundle, ApplicationVersionBuildInfo, BuildInfo};
use crate::id::BuildId;
use crate::log::LogEvent;

/// Live log events of one build. Ends when the build finishes or the
/// connection drops; it cannot be resumed.
pub type LogEventStream = BoxStream<'static, Result<LogEvent>>;

/// Trait for remote image build services.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Submit every image of an application version. Returns one build per image.
    async fn submit(&self, request: ApplicationVersionBuildBundle)
    -> Result<ApplicationVersionBuildInfo>;

    /// Open the log stream of a build.
    async fn stream_logs(&self, id: &BuildId) -> Result<LogEventStream>;

    /// Get the current state of a build.
    async fn build_info(&self, id: &BuildId) -> Result<BuildInfo>;

    /// Ask the service to cancel a build. Best effort.
    async fn cancel_build(&self, id: &BuildId) -> Result<()>;
}

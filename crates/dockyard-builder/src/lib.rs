//! Concurrent image builds for Dockyard.
//!
//! Submits every image of an application version to the build service,
//! follows all log streams at once and reports a final result per image.
//! On failure or interruption, local consumers are stopped and the remote
//! builds are cancelled.

pub mod console;
pub mod context;
pub mod orchestrator;
pub mod request;
pub mod summary;
pub mod tracker;

pub use console::{Console, MemoryConsole, TerminalConsole};
pub use context::{ContextCompiler, TarballCompiler};
pub use orchestrator::ImageBuilder;
pub use request::{ApplicationVersionBuildRequest, ImageBuildRequest};
pub use summary::{BuildSummary, Outcome};
pub use tracker::BuildProgressTracker;

//! HTTP client for the Dockyard image build service.
//!
//! Implements [`BuildService`] against the hosted builder:
//! - multipart submission of application versions
//! - server-sent event log streams
//! - build status and cancellation

pub mod http;
pub mod payload;
pub mod sse;

pub use dockyard_core::service::{BuildService, LogEventStream};
pub use http::HttpBuildService;

//! Core domain types and traits for Dockyard.
//!
//! This crate contains:
//! - Identifiers for builds and image requests
//! - Image definitions
//! - Build requests, build state and log events
//! - The build service trait
//! - Error types and the error classifier

pub mod build;
pub mod classify;
pub mod error;
pub mod id;
pub mod image;
pub mod log;
pub mod service;

pub use build::{
    ApplicationVersionBuildBundle, ApplicationVersionBuildInfo, BuildInfo, BuildStatus,
    ImageBuildBundle,
};
pub use classify::{Diagnostic, ErrorKind, classify};
pub use error::{Error, Result, TransportError, TransportErrorKind};
pub use id::{BuildId, ClientKey};
pub use image::{BuildOperation, Image};
pub use log::{LogChannel, LogEvent};
pub use service::{BuildService, LogEventStream};

//! Configuration for Dockyard.
//!
//! This crate handles:
//! - Application manifests (dockyard.kdl)
//! - Build service client settings

pub mod client;
pub mod error;
pub mod manifest;

pub use client::ClientConfig;
pub use error::{ConfigError, ConfigResult};
pub use manifest::{ImageEntry, Manifest, load_manifest, parse_manifest};

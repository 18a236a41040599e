//! Declarative container image definitions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Base image used when a definition does not name one.
pub const DEFAULT_BASE_IMAGE: &str = "python:3.11-slim-bookworm";

/// A single step applied on top of the base image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildOperation {
    /// Run a shell command.
    Run { command: String },
    /// Copy a local path into the image.
    Copy { src: String, dest: String },
    /// Add a local path or remote reference into the image.
    Add { src: String, dest: String },
    /// Set an environment variable.
    Env { key: String, value: String },
}

impl BuildOperation {
    fn instruction(&self) -> &'static str {
        match self {
            BuildOperation::Run { .. } => "RUN",
            BuildOperation::Copy { .. } => "COPY",
            BuildOperation::Add { .. } => "ADD",
            BuildOperation::Env { .. } => "ENV",
        }
    }

    /// Render as a Dockerfile instruction.
    pub fn render(&self) -> String {
        match self {
            BuildOperation::Run { command } => format!("RUN {}", command),
            BuildOperation::Copy { src, dest } => format!("COPY {} {}", src, dest),
            BuildOperation::Add { src, dest } => format!("ADD {} {}", src, dest),
            BuildOperation::Env { key, value } => format!("ENV {}=\"{}\"", key, value),
        }
    }
}

/// A container image: base plus ordered build operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub base_image: String,
    pub operations: Vec<BuildOperation>,
}

impl Image {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            operations: Vec::new(),
        }
    }

    pub fn base_image(mut self, base: impl Into<String>) -> Self {
        self.base_image = base.into();
        self
    }

    pub fn run(mut self, command: impl Into<String>) -> Self {
        self.operations.push(BuildOperation::Run {
            command: command.into(),
        });
        self
    }

    pub fn copy(mut self, src: impl Into<String>, dest: impl Into<String>) -> Self {
        self.operations.push(BuildOperation::Copy {
            src: src.into(),
            dest: dest.into(),
        });
        self
    }

    pub fn add(mut self, src: impl Into<String>, dest: impl Into<String>) -> Self {
        self.operations.push(BuildOperation::Add {
            src: src.into(),
            dest: dest.into(),
        });
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.operations.push(BuildOperation::Env {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Dockerfile the build service will execute.
    pub fn dockerfile(&self) -> String {
        let mut lines = vec![format!("FROM {}", self.base_image), "WORKDIR /app".to_string()];
        lines.extend(self.operations.iter().map(BuildOperation::render));
        lines.join("\n")
    }

    /// SHA-256 over the definition, hex encoded.
    ///
    /// Only the definition is hashed; the contents of copied paths are not.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.base_image.as_bytes());
        for op in &self.operations {
            hasher.update(op.instruction().as_bytes());
            match op {
                BuildOperation::Run { command } => hasher.update(command.as_bytes()),
                BuildOperation::Copy { src, dest } | BuildOperation::Add { src, dest } => {
                    hasher.update(src.as_bytes());
                    hasher.update(dest.as_bytes());
                }
                BuildOperation::Env { key, value } => {
                    hasher.update(key.as_bytes());
                    hasher.update(value.as_bytes());
                }
            }
        }
        hex::encode(hasher.finalize())
    }
}

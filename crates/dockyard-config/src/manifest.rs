//! Application manifest parsing.
//!
//! ```kdl
//! application "my-app" version="v1.0.0"
//!
//! image "pdf-processor" base="ubuntu:24.04" {
//!     run "apt update && apt install -y poppler-utils"
//!     env "LANG" "C.UTF-8"
//!     copy "src" "/app/src"
//!     functions "parse_pdf" "extract_text"
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use dockyard_core::image::{DEFAULT_BASE_IMAGE, Image};
use kdl::{KdlDocument, KdlNode};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// An application and the images its functions run in.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: String,
    /// Version from the manifest; the CLI may override it.
    pub version: Option<String>,
    pub images: Vec<ImageEntry>,
}

/// One image and the functions that run in it.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub image: Image,
    pub functions: Vec<String>,
}

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> ConfigResult<Manifest> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest(&content)
}

/// Parse a manifest from KDL text.
pub fn parse_manifest(kdl: &str) -> ConfigResult<Manifest> {
    let doc: KdlDocument = kdl.parse()?;

    let mut name = String::new();
    let mut version = None;
    let mut images = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "application" => {
                name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("application name".to_string()))?;
                version = get_string_prop(node, "version");
            }
            "image" => {
                images.push(parse_image(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("application name".to_string()));
    }
    if version.as_deref() == Some("") {
        return Err(ConfigError::InvalidValue {
            field: "version".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    // A function runs in exactly one image
    let mut seen = HashSet::new();
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for entry in &images {
        if !seen.insert(entry.image.name.as_str()) {
            return Err(ConfigError::Duplicate(format!("image '{}'", entry.image.name)));
        }
        for function in &entry.functions {
            if let Some(owner) = owners.insert(function.as_str(), entry.image.name.as_str()) {
                return Err(ConfigError::Duplicate(format!(
                    "function '{}' is listed in images '{}' and '{}'",
                    function, owner, entry.image.name
                )));
            }
        }
    }

    Ok(Manifest {
        name,
        version,
        images,
    })
}

fn parse_image(node: &KdlNode) -> ConfigResult<ImageEntry> {
    let name = get_first_string_arg(node)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ConfigError::MissingField("image name".to_string()))?;
    let base = get_string_prop(node, "base").unwrap_or_else(|| DEFAULT_BASE_IMAGE.to_string());

    let mut image = Image::new(name.clone()).base_image(base);
    let mut functions = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "run" => {
                    let cmd = get_first_string_arg(child)
                        .ok_or_else(|| missing_arg(&name, "run"))?;
                    image = image.run(cmd);
                }
                "copy" => {
                    let (src, dest) = src_dest(child).ok_or_else(|| missing_arg(&name, "copy"))?;
                    image = image.copy(src, dest);
                }
                "add" => {
                    let (src, dest) = src_dest(child).ok_or_else(|| missing_arg(&name, "add"))?;
                    image = image.add(src, dest);
                }
                "env" => {
                    let args = get_all_string_args(child);
                    match args.as_slice() {
                        [key, value] => image = image.env(key, value),
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                field: format!("env in image '{}'", name),
                                message: "expected a key and a value".to_string(),
                            });
                        }
                    }
                }
                "functions" => {
                    functions.extend(get_all_string_args(child));
                }
                _ => {}
            }
        }
    }

    if functions.is_empty() {
        return Err(ConfigError::MissingField(format!(
            "functions for image '{}'",
            name
        )));
    }
    if functions.iter().any(|f| f.is_empty()) {
        return Err(ConfigError::InvalidValue {
            field: format!("functions for image '{}'", name),
            message: "function names must not be empty".to_string(),
        });
    }

    Ok(ImageEntry { image, functions })
}

fn missing_arg(image: &str, op: &str) -> ConfigError {
    ConfigError::MissingField(format!("argument of '{}' in image '{}'", op, image))
}

/// `copy "src"` copies to the same relative path; `copy "src" "dest"` is explicit.
fn src_dest(node: &KdlNode) -> Option<(String, String)> {
    let mut args = get_all_string_args(node).into_iter();
    let src = args.next()?;
    let dest = args.next().unwrap_or_else(|| src.clone());
    Some((src, dest))
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

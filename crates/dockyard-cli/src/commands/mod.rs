//! CLI command implementations.

pub mod build;
pub mod builds;

use anyhow::{Context, Result};
use colored::Colorize;
use dockyard_config::load_manifest;
use std::path::Path;

pub fn validate(path: &Path) -> Result<()> {
    let manifest = load_manifest(path)
        .with_context(|| format!("Invalid manifest: {}", path.display()))?;

    println!(
        "{} {}",
        "Application".bold(),
        match &manifest.version {
            Some(version) => format!("{} ({})", manifest.name, version),
            None => manifest.name.clone(),
        }
    );
    for entry in &manifest.images {
        let hash = entry.image.content_hash();
        println!(
            "  {} {} from {}",
            entry.image.name.cyan(),
            &hash[..12],
            entry.image.base_image
        );
        println!("    functions: {}", entry.functions.join(", "));
    }
    println!("Manifest is valid");
    Ok(())
}

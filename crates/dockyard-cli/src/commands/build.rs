//! `dockyard build`: build every image of the manifest.

use anyhow::{Context, Result};
use colored::Colorize;
use dockyard_builder::{
    ApplicationVersionBuildRequest, ImageBuilder, TarballCompiler, TerminalConsole,
};
use dockyard_config::{Manifest, load_manifest};
use dockyard_core::service::BuildService;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Returns whether every image completed.
pub async fn run(
    service: Arc<dyn BuildService>,
    manifest_path: &Path,
    version: Option<String>,
    root: Option<PathBuf>,
) -> Result<bool> {
    let manifest = load_manifest(manifest_path)
        .with_context(|| format!("Failed to load manifest: {}", manifest_path.display()))?;
    let request = build_request(manifest, version)?;

    let root = match root {
        Some(root) => root,
        None => manifest_dir(manifest_path),
    };
    info!(root = %root.display(), images = request.images().len(), "Building application");

    let builder = ImageBuilder::new(
        service,
        Arc::new(TarballCompiler::new(root)),
        Arc::new(TerminalConsole::new()),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = || async { tokio::signal::ctrl_c().await.is_ok() };
        if watch_interrupts(ctrl_c, trigger).await {
            eprintln!(
                "{}",
                "Interrupted again, exiting without waiting for cancellation.".red()
            );
            std::process::exit(130);
        }
    });

    let summary = builder
        .build_until(&request, cancel)
        .await
        .context("Build failed")?;
    Ok(summary.is_success())
}

/// Fire `cancel` on the first interrupt, then wait for a second one.
/// Returns true when the second interrupt arrived.
async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupt().await {
        return false;
    }
    warn!("Interrupted, cancelling builds (press Ctrl-C again to exit)");
    eprintln!(
        "{}",
        "Interrupted, cancelling builds. Press Ctrl-C again to exit.".yellow()
    );
    cancel.cancel();
    interrupt().await
}

/// Turn a manifest into a build request. `version` wins over the manifest's.
fn build_request(
    manifest: Manifest,
    version: Option<String>,
) -> Result<ApplicationVersionBuildRequest> {
    let version = version
        .or(manifest.version)
        .context("No version given; pass --version or set version= on the application node")?;

    let mut request = ApplicationVersionBuildRequest::new(manifest.name, version)?;
    for entry in manifest.images {
        request.add_image(entry.image, entry.functions)?;
    }
    Ok(request)
}

fn manifest_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

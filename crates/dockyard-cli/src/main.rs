//! Dockyard CLI tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dockyard_client::HttpBuildService;
use dockyard_config::ClientConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Build application container images", long_about = None)]
struct Cli {
    /// Image build service URL (overrides DOCKYARD_BUILD_SERVICE)
    #[arg(long)]
    build_service_url: Option<String>,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every image of an application version
    Build {
        /// Path to the application manifest
        #[arg(long, env = "DOCKYARD_MANIFEST", default_value = "dockyard.kdl")]
        manifest: PathBuf,
        /// Version to build (overrides the manifest)
        #[arg(long)]
        version: Option<String>,
        /// Directory COPY and ADD sources are resolved against
        /// (defaults to the manifest's directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Validate an application manifest
    Validate {
        /// Path to the application manifest
        #[arg(long, env = "DOCKYARD_MANIFEST", default_value = "dockyard.kdl")]
        manifest: PathBuf,
    },
    /// Show the state of an image build
    Status {
        /// Image build ID
        id: String,
    },
    /// Cancel an image build
    Cancel {
        /// Image build ID
        id: String,
    },
    /// Follow the logs of an image build
    Logs {
        /// Image build ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Validate { manifest } = &cli.command {
        commands::validate(manifest)?;
        return Ok(());
    }

    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(url) = cli.build_service_url {
        config.build_service_url = url.trim_end_matches('/').to_string();
    }
    let service = Arc::new(
        HttpBuildService::new(&config).context("Failed to create build service client")?,
    );

    let success = match cli.command {
        Commands::Build {
            manifest,
            version,
            root,
        } => commands::build::run(service, &manifest, version, root).await?,
        Commands::Status { id } => {
            commands::builds::status(service.as_ref(), &id).await?;
            true
        }
        Commands::Cancel { id } => {
            commands::builds::cancel(service.as_ref(), &id).await?;
            true
        }
        Commands::Logs { id } => commands::builds::logs(service, &id).await?,
        Commands::Validate { .. } => true,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

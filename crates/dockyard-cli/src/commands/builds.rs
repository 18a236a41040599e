//! Commands acting on a single image build.

use anyhow::{Result, anyhow};
use dockyard_builder::{BuildProgressTracker, Outcome, TerminalConsole};
use dockyard_core::classify::classify;
use dockyard_core::id::BuildId;
use dockyard_core::service::BuildService;
use std::sync::Arc;

fn describe(err: dockyard_core::Error) -> anyhow::Error {
    anyhow!("{}", classify(&err))
}

pub async fn status(service: &dyn BuildService, id: &str) -> Result<()> {
    let info = service
        .build_info(&BuildId::new(id))
        .await
        .map_err(describe)?;

    println!("Build:    {}", info.display_name());
    println!("Status:   {}", info.status);
    if let Some(message) = &info.error_message {
        println!("Error:    {}", message);
    }
    if let Some(created_at) = &info.created_at {
        println!("Created:  {}", created_at);
    }
    if let Some(finished_at) = &info.finished_at {
        println!("Finished: {}", finished_at);
    }
    Ok(())
}

pub async fn cancel(service: &dyn BuildService, id: &str) -> Result<()> {
    service
        .cancel_build(&BuildId::new(id))
        .await
        .map_err(describe)?;
    println!("Cancellation requested for build {}", id);
    Ok(())
}

/// Follow one build until its log stream ends or Ctrl-C, then print its
/// final result. Returns whether it completed.
pub async fn logs(service: Arc<dyn BuildService>, id: &str) -> Result<bool> {
    let id = BuildId::new(id);
    let info = service.build_info(&id).await.map_err(describe)?;
    let mut tracker = BuildProgressTracker::new(&info, 0, Arc::new(TerminalConsole::new()));

    if !info.status.is_terminal() {
        let stream = service.stream_logs(&id).await.map_err(describe)?;
        tokio::select! {
            result = tracker.consume(stream) => {
                if let Err(e) = result {
                    tracing::warn!(build_id = %id, error = %classify(&e), "Log stream ended early");
                }
            }
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    let last = service.build_info(&id).await.ok();
    Ok(tracker.finish(last) == Outcome::Completed)
}

//! Build orchestrator - submits an application version and follows every
//! image build until it ends.

use dockyard_core::classify::classify;
use dockyard_core::id::BuildId;
use dockyard_core::service::{BuildService, LogEventStream};
use dockyard_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::console::{Channel, Console, ConsoleLine, print_summary};
use crate::context::ContextCompiler;
use crate::request::ApplicationVersionBuildRequest;
use crate::summary::BuildSummary;
use crate::tracker::BuildProgressTracker;

type SharedTracker = Arc<Mutex<BuildProgressTracker>>;

/// Log consumer tasks of one build. Dropping the group aborts whatever is
/// still running.
pub(crate) struct ConsumerGroup {
    tasks: JoinSet<Result<()>>,
}

impl ConsumerGroup {
    pub(crate) fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every task. One task failing never stops the others.
    pub(crate) async fn join_all(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(error = %classify(&e), "Log consumer stopped with error");
                }
                Err(e) if e.is_panic() => error!(error = %e, "Log consumer panicked"),
                Err(_) => {}
            }
        }
    }

    /// Abort every task and wait until none is alive.
    pub(crate) async fn shutdown(&mut self) {
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "Log consumer panicked during shutdown");
                }
            }
        }
    }
}

/// Builds every image of an application version concurrently.
pub struct ImageBuilder {
    service: Arc<dyn BuildService>,
    compiler: Arc<dyn ContextCompiler>,
    console: Arc<dyn Console>,
}

impl ImageBuilder {
    pub fn new(
        service: Arc<dyn BuildService>,
        compiler: Arc<dyn ContextCompiler>,
        console: Arc<dyn Console>,
    ) -> Self {
        Self {
            service,
            compiler,
            console,
        }
    }

    /// Build without an external interruption signal.
    pub async fn build(&self, request: &ApplicationVersionBuildRequest) -> Result<BuildSummary> {
        self.build_until(request, CancellationToken::new()).await
    }

    /// Build until done or until `cancel` fires.
    ///
    /// Errors only when submission or log stream setup fails, or when
    /// cancelled. Once submission succeeded every image gets a final line,
    /// whatever happens afterwards.
    pub async fn build_until(
        &self,
        request: &ApplicationVersionBuildRequest,
        cancel: CancellationToken,
    ) -> Result<BuildSummary> {
        // Submit
        let trackers = match self.submit(request, &cancel).await {
            Ok(trackers) => trackers,
            Err(e) => {
                self.report("Failed to submit build", &e);
                return Err(e);
            }
        };
        let builds: Vec<BuildId> = {
            let mut ids = Vec::with_capacity(trackers.len());
            for tracker in &trackers {
                ids.push(tracker.lock().await.build_id().clone());
            }
            ids
        };

        // Stream
        let mut streams: Vec<LogEventStream> = Vec::with_capacity(builds.len());
        for id in &builds {
            let acquired = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                stream = self.service.stream_logs(id) => stream,
            };
            match acquired {
                Ok(stream) => streams.push(stream),
                Err(e) => {
                    match e {
                        Error::Cancelled => self.report("Build interrupted", &e),
                        _ => self.report(&format!("Failed to stream logs of build {}", id), &e),
                    }
                    drop(streams);
                    self.cascade(None, &builds).await;
                    self.finalize(&trackers).await;
                    return Err(e);
                }
            }
        }

        let mut group = ConsumerGroup::new();
        for (tracker, stream) in trackers.iter().zip(streams) {
            let tracker = tracker.clone();
            group.spawn(async move { tracker.lock().await.consume(stream).await });
        }
        debug!(consumers = group.len(), "Consuming build logs");

        let interrupted = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = group.join_all() => false,
        };
        if interrupted {
            self.report("Build interrupted", &Error::Cancelled);
            self.cascade(Some(&mut group), &builds).await;
            self.finalize(&trackers).await;
            return Err(Error::Cancelled);
        }

        // Finalize
        let summary = self.finalize(&trackers).await;
        print_summary(self.console.as_ref(), &summary);
        info!(
            application = %request.name(),
            version = %request.version(),
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            "Build finished"
        );
        Ok(summary)
    }

    async fn submit(
        &self,
        request: &ApplicationVersionBuildRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<SharedTracker>> {
        let submission = async {
            let bundle = request.synthesize(self.compiler.clone()).await?;
            self.service.submit(bundle).await
        };
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            submitted = submission => submitted?,
        };

        info!(
            application_version = %submitted.id,
            images = submitted.image_builds.len(),
            "Application version submitted"
        );

        Ok(submitted
            .image_builds
            .values()
            .enumerate()
            .map(|(ordinal, info)| {
                Arc::new(Mutex::new(BuildProgressTracker::new(
                    info,
                    ordinal,
                    self.console.clone(),
                )))
            })
            .collect())
    }

    /// Stop every local consumer, then ask the service to cancel every build.
    /// Never fails.
    async fn cascade(&self, group: Option<&mut ConsumerGroup>, builds: &[BuildId]) {
        warn!(builds = builds.len(), "Cancelling image builds");

        if let Some(group) = group {
            group.shutdown().await;
        }

        for id in builds {
            match self.service.cancel_build(id).await {
                Ok(()) => debug!(build_id = %id, "Cancellation requested"),
                Err(e) => {
                    let diagnostic = classify(&e);
                    warn!(
                        build_id = %id,
                        kind = %diagnostic.kind,
                        error = %diagnostic,
                        "Failed to cancel build"
                    );
                }
            }
        }
    }

    /// Fetch the final state of every build and print it. Failures only
    /// affect the build they happen on.
    async fn finalize(&self, trackers: &[SharedTracker]) -> BuildSummary {
        let mut summary = BuildSummary::default();
        for tracker in trackers {
            let mut tracker = tracker.lock().await;
            let id = tracker.build_id().clone();
            let info = match self.service.build_info(&id).await {
                Ok(info) => Some(info),
                Err(e) => {
                    self.report(&format!("Failed to get final status of build {}", id), &e);
                    None
                }
            };
            summary.record(tracker.finish(info));
        }
        summary
    }

    fn report(&self, context: &str, err: &Error) {
        let diagnostic = classify(err);
        error!(kind = %diagnostic.kind, error = %diagnostic, "{}", context);
        self.console.emit(ConsoleLine::plain(
            Channel::Err,
            format!("{}: {}", context, diagnostic),
        ));
    }
}

//! Per-image build progress.

use dockyard_core::Result;
use dockyard_core::build::{BuildInfo, BuildStatus};
use dockyard_core::id::BuildId;
use dockyard_core::log::{LogChannel, LogEvent};
use dockyard_core::service::LogEventStream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use crate::console::{Channel, Console, ConsoleLine, Prefix, color_for};
use crate::summary::Outcome;

/// Follows one image build: renders its log events as they arrive and its
/// final result exactly once.
pub struct BuildProgressTracker {
    build_id: BuildId,
    prefix: Prefix,
    console: Arc<dyn Console>,
    events: Vec<LogEvent>,
    last_seen_status: BuildStatus,
    outcome: Option<Outcome>,
}

impl BuildProgressTracker {
    /// `ordinal` is the image's position in the build and picks its color.
    pub fn new(info: &BuildInfo, ordinal: usize, console: Arc<dyn Console>) -> Self {
        Self {
            build_id: info.id.clone(),
            prefix: Prefix {
                name: info.display_name(),
                color: color_for(ordinal),
            },
            console,
            events: Vec::new(),
            last_seen_status: info.status.clone(),
            outcome: None,
        }
    }

    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    pub fn display_name(&self) -> &str {
        &self.prefix.name
    }

    pub fn last_seen_status(&self) -> &BuildStatus {
        &self.last_seen_status
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Pump a log stream until it ends. A stream error stops consumption.
    pub async fn consume(&mut self, mut stream: LogEventStream) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }

        while let Some(event) = stream.next().await {
            let event = event?;
            self.render_event(&event, None);
            self.last_seen_status = event.build_status.clone();
            self.events.push(event);
        }

        debug!(build_id = %self.build_id, events = self.events.len(), "Log stream ended");
        Ok(())
    }

    /// Render the final result. Only the first call has any effect; later
    /// calls return the first outcome.
    pub fn finish(&mut self, info: Option<BuildInfo>) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        let (outcome, channel, text) = match &info {
            None => (
                Outcome::Unknown,
                Channel::Err,
                format!("Build status unknown (last seen: {})", self.last_seen_status),
            ),
            Some(info) => {
                let outcome = Outcome::from(&info.status);
                let (channel, text) = match outcome {
                    Outcome::Completed => (Channel::Out, "Build completed.".to_string()),
                    Outcome::Failed => match info.error_message.as_deref() {
                        Some(message) if !message.is_empty() => {
                            (Channel::Err, format!("Build failed: {}", message))
                        }
                        _ => (Channel::Err, "Build failed.".to_string()),
                    },
                    Outcome::Canceled => (Channel::Out, "Build canceled.".to_string()),
                    Outcome::Unknown => {
                        (Channel::Out, format!("Unexpected status: {}", info.status))
                    }
                };
                (outcome, channel, text)
            }
        };

        self.outcome = Some(outcome);
        self.console
            .emit(ConsoleLine::tagged(&self.prefix, channel, text));

        if outcome == Outcome::Failed {
            self.replay();
        }
        outcome
    }

    /// Print the whole cached log in sequence order on the error channel.
    fn replay(&mut self) {
        self.events.sort_by_key(|event| event.sequence_number);
        for event in &self.events {
            self.render_event(event, Some(Channel::Err));
        }
    }

    fn render_event(&self, event: &LogEvent, force: Option<Channel>) {
        let mut channel = Channel::Out;
        let mut text = if event.build_status == BuildStatus::Pending {
            "Build waiting in queue.".to_string()
        } else {
            event.message.trim_end_matches(['\r', '\n']).to_string()
        };

        match event.stream {
            LogChannel::Stdout => {}
            LogChannel::Stderr => channel = Channel::Err,
            LogChannel::Info => {
                text = format!(
                    "{} - {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.message.trim_end()
                );
            }
        }

        self.console
            .emit(ConsoleLine::tagged(&self.prefix, force.unwrap_or(channel), text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;
    use chrono::{TimeZone, Utc};
    use dockyard_core::Error;

    fn event(
        id: &str,
        seq: u64,
        stream: LogChannel,
        message: &str,
        status: BuildStatus,
    ) -> LogEvent {
        LogEvent {
            image_build_id: BuildId::new(id),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, seq as u32).unwrap(),
            stream,
            message: message.to_string(),
            sequence_number: seq,
            build_status: status,
        }
    }

    fn stream_of(events: Vec<LogEvent>) -> LogEventStream {
        Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
    }

    fn tracker(console: &Arc<MemoryConsole>) -> BuildProgressTracker {
        let info = BuildInfo::new("b1", BuildStatus::Pending).with_name("worker");
        BuildProgressTracker::new(&info, 2, console.clone())
    }

    #[tokio::test]
    async fn test_consume_renders_events() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        let events = vec![
            event("b1", 1, LogChannel::Info, "queued", BuildStatus::Pending),
            event("b1", 2, LogChannel::Stdout, "Step 1/3\n", BuildStatus::Processing),
            event("b1", 3, LogChannel::Stderr, "warning: slow", BuildStatus::Processing),
            event("b1", 4, LogChannel::Info, "pushed", BuildStatus::Completed),
        ];
        tracker.consume(stream_of(events)).await.unwrap();

        let lines = console.lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text, "2024-05-01 12:00:01 - queued");
        assert_eq!(lines[1].text, "Step 1/3");
        assert_eq!(lines[2].channel, Channel::Err);
        assert_eq!(lines[3].text, "2024-05-01 12:00:04 - pushed");
        assert!(lines.iter().all(|l| l.prefix.as_ref().unwrap().name == "worker (b1)"));
        assert_eq!(lines[0].prefix.as_ref().unwrap().color, color_for(2));
        assert_eq!(tracker.last_seen_status(), &BuildStatus::Completed);
    }

    #[tokio::test]
    async fn test_pending_stdout_shows_queue_message() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        let events = vec![event("b1", 1, LogChannel::Stdout, "raw", BuildStatus::Pending)];
        tracker.consume(stream_of(events)).await.unwrap();

        assert_eq!(console.texts(), vec!["Build waiting in queue."]);
    }

    #[tokio::test]
    async fn test_stream_error_stops_consumption() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        let items = vec![
            Ok(event("b1", 1, LogChannel::Stdout, "one", BuildStatus::Processing)),
            Err(Error::Decode("broken".to_string())),
            Ok(event("b1", 2, LogChannel::Stdout, "two", BuildStatus::Processing)),
        ];
        let result = tracker
            .consume(Box::pin(futures::stream::iter(items)))
            .await;

        assert!(matches!(result, Err(Error::Decode(_))));
        assert_eq!(console.texts(), vec!["one"]);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        let info = BuildInfo::new("b1", BuildStatus::Completed);
        assert_eq!(tracker.finish(Some(info.clone())), Outcome::Completed);
        assert_eq!(tracker.finish(Some(info)), Outcome::Completed);
        assert_eq!(tracker.finish(None), Outcome::Completed);

        assert_eq!(console.texts(), vec!["Build completed."]);
        assert!(tracker.is_finished());
    }

    #[tokio::test]
    async fn test_consume_after_finish_is_noop() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);
        tracker.finish(Some(BuildInfo::new("b1", BuildStatus::Canceled)));

        let events = vec![event("b1", 1, LogChannel::Stdout, "late", BuildStatus::Processing)];
        tracker.consume(stream_of(events)).await.unwrap();

        assert_eq!(console.texts(), vec!["Build canceled."]);
    }

    #[tokio::test]
    async fn test_failure_replays_log_in_sequence_order() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        let events = vec![
            event("b1", 3, LogChannel::Stdout, "third", BuildStatus::Processing),
            event("b1", 1, LogChannel::Stdout, "first", BuildStatus::Processing),
            event("b1", 2, LogChannel::Stderr, "second", BuildStatus::Failed),
        ];
        tracker.consume(stream_of(events)).await.unwrap();

        let info = BuildInfo::new("b1", BuildStatus::Failed).with_error("pip install exit code 1");
        assert_eq!(tracker.finish(Some(info)), Outcome::Failed);

        let lines = console.lines();
        let tail: Vec<&ConsoleLine> = lines.iter().skip(3).collect();
        assert_eq!(tail[0].text, "Build failed: pip install exit code 1");
        let replay: Vec<&str> = tail[1..].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(replay, vec!["first", "second", "third"]);
        assert!(tail.iter().all(|l| l.channel == Channel::Err));
    }

    #[test]
    fn test_failure_without_message() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        tracker.finish(Some(BuildInfo::new("b1", BuildStatus::Failed)));
        assert_eq!(console.texts(), vec!["Build failed."]);
    }

    #[test]
    fn test_unknown_outcomes() {
        let console = Arc::new(MemoryConsole::new());
        let mut first = tracker(&console);
        assert_eq!(first.finish(None), Outcome::Unknown);

        let mut second = tracker(&console);
        let info = BuildInfo::new("b1", BuildStatus::Unknown("exploded".to_string()));
        assert_eq!(second.finish(Some(info)), Outcome::Unknown);

        assert_eq!(
            console.texts(),
            vec![
                "Build status unknown (last seen: pending)",
                "Unexpected status: exploded",
            ]
        );
    }

    #[test]
    fn test_non_terminal_final_status_is_unknown() {
        let console = Arc::new(MemoryConsole::new());
        let mut tracker = tracker(&console);

        let info = BuildInfo::new("b1", BuildStatus::Processing);
        assert_eq!(tracker.finish(Some(info)), Outcome::Unknown);
        assert_eq!(console.texts(), vec!["Unexpected status: processing"]);
    }
}

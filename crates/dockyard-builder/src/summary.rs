//! Per-image outcomes and the build summary.

use dockyard_core::build::BuildStatus;

/// How one image build ended, as far as this client knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    Canceled,
    Unknown,
}

impl From<&BuildStatus> for Outcome {
    fn from(status: &BuildStatus) -> Self {
        match status {
            BuildStatus::Completed => Outcome::Completed,
            BuildStatus::Failed => Outcome::Failed,
            BuildStatus::Canceled => Outcome::Canceled,
            _ => Outcome::Unknown,
        }
    }
}

/// Counters over every image of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
    pub unknown: usize,
}

impl BuildSummary {
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Canceled => self.canceled += 1,
            Outcome::Unknown => self.unknown += 1,
        }
    }

    /// True when every image completed.
    pub fn is_success(&self) -> bool {
        self.completed == self.total
    }
}

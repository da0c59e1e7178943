//! Task pipeline value types
//!
//! `Task` descriptors are static, `TaskOutcome` is produced once per task per
//! run, and `RunStats` is the fold of all outcomes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a tune-up pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Human readable name, shown as the status line
    pub name: String,

    /// Grouping label (Cleanup, Network, ...)
    pub phase: String,

    /// Key into the action table
    pub action_id: String,

    /// Unsafe tasks only run in aggressive mode
    pub safe: bool,
}

impl Task {
    /// Create a task that runs in every mode
    pub fn new(
        name: impl Into<String>,
        phase: impl Into<String>,
        action_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phase: phase.into(),
            action_id: action_id.into(),
            safe: true,
        }
    }

    /// Mark the task as aggressive-only
    pub fn unsafe_only(mut self) -> Self {
        self.safe = false;
        self
    }
}

/// Result of one task in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Applied,
    SkippedUnsafe,
    Failed(String),
}

impl TaskOutcome {
    /// Short tag used in log lines
    pub fn tag(&self) -> &'static str {
        match self {
            TaskOutcome::Applied => "OK",
            TaskOutcome::SkippedUnsafe => "SKIP",
            TaskOutcome::Failed(_) => "ERR",
        }
    }
}

/// Aggregated result of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub cleaned_bytes: u64,
    pub applied: u32,
    pub skipped: u32,
    pub errors: u32,
    pub duration: Duration,
}

impl RunStats {
    /// Fold one outcome and its optional byte payload
    pub fn record(&mut self, outcome: &TaskOutcome, bytes_freed: Option<u64>) {
        match outcome {
            TaskOutcome::Applied => self.applied += 1,
            TaskOutcome::SkippedUnsafe => self.skipped += 1,
            TaskOutcome::Failed(_) => self.errors += 1,
        }
        if let Some(bytes) = bytes_freed {
            self.cleaned_bytes = self.cleaned_bytes.saturating_add(bytes);
        }
    }

    /// Number of tasks folded so far
    pub fn total(&self) -> u32 {
        self.applied + self.skipped + self.errors
    }

    /// Freed space in whole megabytes
    pub fn cleaned_mb(&self) -> u64 {
        self.cleaned_bytes / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new("Flush DNS resolver cache", "Network", "flush_dns");
        assert!(task.safe);
        assert!(!task.unsafe_only().safe);
    }

    #[test]
    fn test_run_stats_fold() {
        let mut stats = RunStats::default();
        stats.record(&TaskOutcome::Applied, Some(3 * 1024 * 1024));
        stats.record(&TaskOutcome::Applied, None);
        stats.record(&TaskOutcome::SkippedUnsafe, None);
        stats.record(&TaskOutcome::Failed("denied".into()), Some(1024 * 1024));

        assert_eq!(stats.applied, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.cleaned_mb(), 4);
    }

    #[test]
    fn test_outcome_tags() {
        assert_eq!(TaskOutcome::Applied.tag(), "OK");
        assert_eq!(TaskOutcome::SkippedUnsafe.tag(), "SKIP");
        assert_eq!(TaskOutcome::Failed(String::new()).tag(), "ERR");
    }
}

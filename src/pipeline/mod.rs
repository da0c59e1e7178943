//! Gated, sequential task pipeline
//!
//! Runs an ordered task list against an `ActionExecutor`, one task at a
//! time. Every task yields exactly one outcome; per-task failures, timeouts
//! and panics are folded into `RunStats` and never abort the run. Progress
//! is reported through an `EventSink` in task order.

pub mod catalog;
pub mod events;

pub use events::{ChannelSink, CollectingSink, EventSink, LogLevel, PipelineEvent};

use crate::actions::{perform_bounded, ActionExecutor, EffectReport};
use crate::errors::{Result, TuneError};
use crate::types::{RunStats, Task, TaskOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Substatus shown for unsafe tasks outside aggressive mode
pub const SKIP_SUBSTATUS: &str = "Skipped advanced tweak (enable Aggressive Mode)";

/// Cooperative cancellation flag, checked between steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-run settings, passed explicitly into the pipeline
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Allow tasks marked unsafe
    pub aggressive: bool,

    /// Invoke the restore point action before the first task
    pub create_restore_point: bool,

    pub cancel: CancelToken,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggressive(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }

    pub fn with_restore_point(mut self, enabled: bool) -> Self {
        self.create_restore_point = enabled;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Ordered task runner
pub struct TaskPipeline {
    tasks: Vec<Task>,
    executor: Arc<dyn ActionExecutor>,
    config: RunConfig,
}

impl std::fmt::Debug for TaskPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPipeline")
            .field("tasks", &self.tasks.len())
            .field("config", &self.config)
            .finish()
    }
}

impl TaskPipeline {
    /// Validate the task list against the executor.
    ///
    /// Fails with `EmptyPipeline` for an empty list and `UnknownAction` for
    /// the first action id the executor cannot perform. Nothing runs until
    /// every id resolves.
    pub fn new(
        tasks: Vec<Task>,
        executor: Arc<dyn ActionExecutor>,
        config: RunConfig,
    ) -> Result<Self> {
        if tasks.is_empty() {
            return Err(TuneError::EmptyPipeline);
        }

        if let Some(missing) = tasks.iter().find(|t| !executor.supports(&t.action_id)) {
            return Err(TuneError::UnknownAction(missing.action_id.clone()));
        }

        Ok(Self {
            tasks,
            executor,
            config,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every task in order and emit `Done(stats)` at the end.
    ///
    /// The only error is `Cancelled`, observed between tasks; in that case
    /// `Error` is emitted instead of `Done`.
    pub async fn run(&self, sink: &dyn EventSink) -> Result<RunStats> {
        let started = Instant::now();
        let total = self.tasks.len();
        let mut stats = RunStats::default();

        info!(
            tasks = total,
            aggressive = self.config.aggressive,
            "Starting task pipeline"
        );

        for (index, task) in self.tasks.iter().enumerate() {
            if self.config.cancel.is_cancelled() {
                warn!(completed = index, total, "Pipeline cancelled");
                sink.emit(PipelineEvent::Error(TuneError::Cancelled.to_string()));
                return Err(TuneError::Cancelled);
            }

            sink.emit(PipelineEvent::Phase(task.phase.clone()));
            sink.emit(PipelineEvent::Status(task.name.clone()));

            let (outcome, report) = self.execute(task).await;
            stats.record(&outcome, report.as_ref().and_then(|r| r.bytes_freed));

            let (substatus, level) = match &outcome {
                TaskOutcome::Applied => (
                    report
                        .as_ref()
                        .and_then(|r| r.detail.clone())
                        .unwrap_or_else(|| "Done".to_string()),
                    LogLevel::Info,
                ),
                TaskOutcome::SkippedUnsafe => (SKIP_SUBSTATUS.to_string(), LogLevel::Info),
                TaskOutcome::Failed(reason) => {
                    (format!("Non-blocking error: {}", reason), LogLevel::Warning)
                }
            };
            sink.emit(PipelineEvent::Substatus(substatus));
            sink.emit(PipelineEvent::log(level, log_line(task, &outcome)));

            let progress = ((index + 1) * 100 / total) as u8;
            sink.emit(PipelineEvent::Progress(progress));
        }

        stats.duration = started.elapsed();
        info!(
            applied = stats.applied,
            skipped = stats.skipped,
            errors = stats.errors,
            cleaned_mb = stats.cleaned_mb(),
            "Task pipeline finished"
        );
        sink.emit(PipelineEvent::Done(stats.clone()));
        Ok(stats)
    }

    /// Produce one outcome for one task
    async fn execute(&self, task: &Task) -> (TaskOutcome, Option<EffectReport>) {
        if !task.safe && !self.config.aggressive {
            debug!(action = %task.action_id, "Skipping unsafe task");
            return (TaskOutcome::SkippedUnsafe, None);
        }

        match perform_bounded(self.executor.as_ref(), &task.action_id).await {
            Ok(report) => (TaskOutcome::Applied, Some(report)),
            Err(e) => {
                warn!(action = %task.action_id, error = %e, "Task failed");
                (TaskOutcome::Failed(e.to_string()), None)
            }
        }
    }
}

/// `OK   | Cleanup | Purge temp and residue files`
fn log_line(task: &Task, outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Failed(reason) => format!(
            "{:<4} | {} | {} | {}",
            outcome.tag(),
            task.phase,
            task.name,
            reason
        ),
        _ => format!("{:<4} | {} | {}", outcome.tag(), task.phase, task.name),
    }
}

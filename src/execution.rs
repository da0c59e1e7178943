//! Session orchestration shared by the CLI commands
//!
//! A session wires the profiler, the pipeline or the diagnostics engine and
//! an event sink together, and runs on a spawned worker so the reporter can
//! drain events on the caller's task.

use crate::actions::{perform_bounded, ActionExecutor, ActionRegistry, DryRunExecutor};
use crate::config::Config;
use crate::errors::{Result, TuneError};
use crate::network::{NetworkDiagnosticsEngine, OptimizeStep};
use crate::pipeline::catalog::RESTORE_POINT_ACTION;
use crate::pipeline::{CancelToken, ChannelSink, EventSink, LogLevel, PipelineEvent, RunConfig, TaskPipeline};
use crate::profiler::{DiskQuery, HardwareProbe, SystemProfiler};
use crate::types::{DiagnosticsRun, EndpointCandidate, RunStats, Task};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Executor for a run: the configured registry, or a dry-run wrapper around it
pub fn build_executor(config: &Config, dry_run: bool) -> Arc<dyn ActionExecutor> {
    let registry: Arc<dyn ActionExecutor> = Arc::new(ActionRegistry::from_specs(
        &config.action_specs(),
        config.default_timeout(),
    ));
    if dry_run {
        Arc::new(DryRunExecutor::new(registry))
    } else {
        registry
    }
}

/// Profile → optional restore point → pipeline
pub struct OptimizationSession {
    probe: Arc<dyn HardwareProbe>,
    disks: Arc<dyn DiskQuery>,
    system_path: PathBuf,
    profiler: SystemProfiler,
    executor: Arc<dyn ActionExecutor>,
    tasks: Vec<Task>,
    run_config: RunConfig,
}

impl OptimizationSession {
    pub fn new(
        probe: Arc<dyn HardwareProbe>,
        disks: Arc<dyn DiskQuery>,
        executor: Arc<dyn ActionExecutor>,
        tasks: Vec<Task>,
    ) -> Self {
        Self {
            probe,
            disks,
            system_path: crate::profiler::probe::default_system_path(),
            profiler: SystemProfiler::new(),
            executor,
            tasks,
            run_config: RunConfig::default(),
        }
    }

    pub fn with_profiler(mut self, profiler: SystemProfiler) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_system_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_path = path.into();
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Run the session on the current task.
    ///
    /// Fatal errors (profiling, validation, cancellation) are emitted as a
    /// single `Error` event and returned; no `Done` follows them.
    pub async fn run(&self, sink: &dyn EventSink) -> Result<RunStats> {
        let pipeline = match self.prepare(sink).await {
            Ok(pipeline) => pipeline,
            Err(e) => {
                let message = format!("Critical optimizer failure: {}", e);
                error!("{}", message);
                sink.emit(PipelineEvent::Error(message));
                return Err(e);
            }
        };

        if self.run_config.create_restore_point {
            self.create_restore_point(sink).await;
        }

        pipeline.run(sink).await
    }

    /// Spawn the session on a worker task
    pub fn spawn(self, sink: ChannelSink) -> JoinHandle<Result<RunStats>> {
        tokio::spawn(async move { self.run(&sink).await })
    }

    /// Profile the machine and validate the task list
    async fn prepare(&self, sink: &dyn EventSink) -> Result<TaskPipeline> {
        sink.emit(PipelineEvent::Phase("Profiling".to_string()));
        sink.emit(PipelineEvent::Status("Reading hardware".to_string()));

        let snapshot = self.probe.snapshot().await.map_err(|e| match e {
            TuneError::Profiling(_) => e,
            other => TuneError::Profiling(other.to_string()),
        })?;

        let disks = Arc::clone(&self.disks);
        let path = self.system_path.clone();
        let disk_free_gb = tokio::task::spawn_blocking(move || disks.free_gb(&path)).await?;

        let profile = self.profiler.build_profile(&snapshot, disk_free_gb);
        info!(hardware = %snapshot.summary(), tier = %profile.tier, "Profile ready");
        sink.emit(PipelineEvent::log(LogLevel::Info, snapshot.summary()));
        sink.emit(PipelineEvent::log(LogLevel::Info, profile.tagline.clone()));
        sink.emit(PipelineEvent::ProfileReady(profile));

        TaskPipeline::new(
            self.tasks.clone(),
            Arc::clone(&self.executor),
            self.run_config.clone(),
        )
    }

    /// Failure here is logged and does not count toward `RunStats`
    async fn create_restore_point(&self, sink: &dyn EventSink) {
        sink.emit(PipelineEvent::Phase("Safety".to_string()));
        sink.emit(PipelineEvent::Status("Creating restore point".to_string()));

        if !self.executor.supports(RESTORE_POINT_ACTION) {
            warn!("Restore point action is not registered");
            sink.emit(PipelineEvent::log(LogLevel::Warning, "Restore point action is not registered"));
            return;
        }

        match perform_bounded(self.executor.as_ref(), RESTORE_POINT_ACTION).await {
            Ok(report) => {
                sink.emit(PipelineEvent::Substatus(
                    report.detail.unwrap_or_else(|| "Restore point created".to_string()),
                ));
                sink.emit(PipelineEvent::log(LogLevel::Info, "OK   | Safety | Restore point"));
            }
            Err(e) => {
                warn!(error = %e, "Restore point failed");
                sink.emit(PipelineEvent::Substatus(format!("Non-blocking error: {}", e)));
                sink.emit(PipelineEvent::log(
                    LogLevel::Warning,
                    format!("ERR  | Safety | Restore point | {}", e),
                ));
            }
        }
    }
}

/// Network diagnostics on a worker task
pub struct DiagnosticsSession {
    engine: Arc<NetworkDiagnosticsEngine>,
    candidates: Vec<EndpointCandidate>,
    optimize: Option<OptimizeStep>,
    cancel: CancelToken,
}

impl DiagnosticsSession {
    pub fn new(engine: Arc<NetworkDiagnosticsEngine>, candidates: Vec<EndpointCandidate>) -> Self {
        Self {
            engine,
            candidates,
            optimize: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_optimize(mut self, step: OptimizeStep) -> Self {
        self.optimize = Some(step);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, sink: &dyn EventSink) -> Result<DiagnosticsRun> {
        self.engine
            .diagnose(&self.candidates, self.optimize.as_ref(), sink, &self.cancel)
            .await
    }

    pub fn spawn(self, sink: ChannelSink) -> JoinHandle<Result<DiagnosticsRun>> {
        tokio::spawn(async move { self.run(&sink).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::EffectReport;
    use crate::pipeline::CollectingSink;
    use crate::types::HardwareSnapshot;
    use async_trait::async_trait;
    use std::path::Path;

    struct StaticProbe(Option<HardwareSnapshot>);

    #[async_trait]
    impl HardwareProbe for StaticProbe {
        async fn snapshot(&self) -> Result<HardwareSnapshot> {
            self.0
                .ok_or_else(|| TuneError::Generic("sensor read failed".to_string()))
        }
    }

    struct FixedDisk(u64);

    impl DiskQuery for FixedDisk {
        fn free_gb(&self, _path: &Path) -> u64 {
            self.0
        }
    }

    fn session(probe: StaticProbe, registry: ActionRegistry, tasks: Vec<Task>) -> OptimizationSession {
        OptimizationSession::new(Arc::new(probe), Arc::new(FixedDisk(120)), Arc::new(registry), tasks)
    }

    fn noop_registry(ids: &[&str]) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for id in ids {
            registry.register_fn(*id, None, || Ok(EffectReport::new()));
        }
        registry
    }

    #[tokio::test]
    async fn test_profile_emitted_before_tasks() {
        let tasks = vec![Task::new("One", "Cleanup", "one")];
        let sink = CollectingSink::new();
        let stats = session(StaticProbe(Some(HardwareSnapshot::default())), noop_registry(&["one"]), tasks)
            .run(&sink)
            .await
            .unwrap();

        assert_eq!(stats.applied, 1);
        let events = sink.events();
        let profile_at = events
            .iter()
            .position(|e| matches!(e, PipelineEvent::ProfileReady(_)))
            .unwrap();
        let first_task = events
            .iter()
            .position(|e| matches!(e, PipelineEvent::Status(s) if s == "One"))
            .unwrap();
        assert!(profile_at < first_task);
    }

    #[tokio::test]
    async fn test_probe_failure_is_critical() {
        let tasks = vec![Task::new("One", "Cleanup", "one")];
        let sink = CollectingSink::new();
        let err = session(StaticProbe(None), noop_registry(&["one"]), tasks)
            .run(&sink)
            .await
            .unwrap_err();

        assert!(matches!(err, TuneError::Profiling(_)));
        let events = sink.events();
        assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Done(_))));
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Error(m)) if m.starts_with("Critical optimizer failure")
        ));
    }

    #[tokio::test]
    async fn test_unknown_action_aborts_before_restore_point() {
        let tasks = vec![Task::new("Ghost", "Cleanup", "ghost")];
        let sink = CollectingSink::new();
        let err = session(
            StaticProbe(Some(HardwareSnapshot::default())),
            noop_registry(&[RESTORE_POINT_ACTION]),
            tasks,
        )
        .with_run_config(RunConfig::new().with_restore_point(true))
        .run(&sink)
        .await
        .unwrap_err();

        assert!(matches!(err, TuneError::UnknownAction(_)));
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::Phase(p) if p == "Safety")));
    }

    #[tokio::test]
    async fn test_restore_point_failure_is_not_counted() {
        let mut registry = noop_registry(&["one"]);
        registry.register_fn(RESTORE_POINT_ACTION, None, || {
            Err(TuneError::action_failed(RESTORE_POINT_ACTION, "service disabled"))
        });
        let tasks = vec![Task::new("One", "Cleanup", "one")];
        let sink = CollectingSink::new();

        let stats = session(StaticProbe(Some(HardwareSnapshot::default())), registry, tasks)
            .with_run_config(RunConfig::new().with_restore_point(true))
            .run(&sink)
            .await
            .unwrap();

        assert_eq!((stats.applied, stats.errors), (1, 0));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::Phase(p) if p == "Safety")));
    }

    #[tokio::test]
    async fn test_spawned_session_streams_events() {
        let tasks = vec![Task::new("One", "Cleanup", "one"), Task::new("Two", "Network", "two")];
        let (sink, mut receiver) = ChannelSink::new();
        let handle = session(
            StaticProbe(Some(HardwareSnapshot::default())),
            noop_registry(&["one", "two"]),
            tasks,
        )
        .spawn(sink);

        let mut progress = Vec::new();
        let mut done = None;
        while let Some(event) = receiver.recv().await {
            match event {
                PipelineEvent::Progress(p) => progress.push(p),
                PipelineEvent::Done(stats) => done = Some(stats),
                _ => {}
            }
        }

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(progress, vec![50, 100]);
        assert_eq!(done, Some(stats));
    }

    #[test]
    fn test_build_executor_covers_catalog() {
        let config = Config::default();
        let executor = build_executor(&config, false);
        for task in crate::pipeline::catalog::default_tasks() {
            assert!(executor.supports(&task.action_id));
        }
        assert!(build_executor(&config, true).supports("flush_dns"));
    }
}

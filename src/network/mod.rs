//! Network diagnostics engine
//!
//! Selects the fastest reachable echo target, measures latency and download
//! throughput, scores stability, and brackets an optional optimize step with
//! a baseline and an after measurement against the same target and endpoint.
//!
//! - `latency`: echo probing and ping output parsing
//! - `throughput`: bounded streaming download
//! - `scoring`: composite stability score

pub mod latency;
pub mod scoring;
pub mod throughput;

pub use latency::{parse_ping_output, LatencyProbe, PingProbe};
pub use scoring::stability_score;
pub use throughput::{compute_mbps, HttpThroughputProbe, ThroughputProbe};

use crate::actions::{perform_bounded, ActionExecutor};
use crate::errors::{Result, TuneError};
use crate::pipeline::{CancelToken, EventSink, LogLevel, PipelineEvent};
use crate::types::{DiagnosticsRun, EndpointCandidate, LatencyResult, TestResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Progress milestones inside one measurement round
const LATENCY_MILESTONE: usize = 35;
const THROUGHPUT_MILESTONE: usize = 85;
const SCORED_MILESTONE: usize = 100;

/// Progress reported once a target is selected
const TARGET_SELECTED_PROGRESS: u8 = 5;

/// Rounds per diagnostics run (baseline, after)
const ROUNDS: usize = 2;

/// Network diagnostics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Echo targets, probed during selection
    pub targets: Vec<EndpointCandidate>,

    /// Download endpoints, tried in order
    pub download_urls: Vec<String>,

    /// Echo requests per measurement round
    pub ping_count: u32,

    /// Bound for a whole measurement round's ping
    pub ping_timeout_sec: u64,

    /// Bound for one selection probe or endpoint check
    pub probe_timeout_sec: u64,

    /// Transfer window for throughput measurement
    pub transfer_sec: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            download_urls: vec![
                "https://speed.cloudflare.com/__down?bytes=10000000".to_string(),
                "https://speed.hetzner.de/10MB.bin".to_string(),
            ],
            ping_count: 4,
            ping_timeout_sec: 15,
            probe_timeout_sec: 5,
            transfer_sec: 20,
        }
    }
}

impl NetworkSettings {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_sec)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_sec)
    }

    pub fn transfer_window(&self) -> Duration {
        Duration::from_secs(self.transfer_sec)
    }
}

/// Public DNS resolvers used as echo targets
pub fn default_targets() -> Vec<EndpointCandidate> {
    vec![
        EndpointCandidate::new("Cloudflare", "1.1.1.1"),
        EndpointCandidate::new("Google DNS", "8.8.8.8"),
        EndpointCandidate::new("Quad9", "9.9.9.9"),
    ]
}

/// Action run between the baseline and after rounds
#[derive(Clone)]
pub struct OptimizeStep {
    pub executor: Arc<dyn ActionExecutor>,
    pub action_id: String,
}

impl OptimizeStep {
    pub fn new(executor: Arc<dyn ActionExecutor>, action_id: impl Into<String>) -> Self {
        Self {
            executor,
            action_id: action_id.into(),
        }
    }
}

/// Return the first candidate, in order, for which `probe` answers true
pub async fn select_first_reachable<'a, T, F, Fut>(candidates: &'a [T], mut probe: F) -> Option<&'a T>
where
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = bool>,
{
    for candidate in candidates {
        if probe(candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// Runs diagnostics rounds against injected probes
pub struct NetworkDiagnosticsEngine {
    latency: Arc<dyn LatencyProbe>,
    throughput: Arc<dyn ThroughputProbe>,
    settings: NetworkSettings,
}

impl NetworkDiagnosticsEngine {
    pub fn new(latency: Arc<dyn LatencyProbe>, throughput: Arc<dyn ThroughputProbe>) -> Self {
        Self {
            latency,
            throughput,
            settings: NetworkSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: NetworkSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Probe every candidate once and keep the lowest average.
    ///
    /// Candidates that fail or exceed the probe timeout are skipped. Ties go
    /// to the candidate seen first.
    pub async fn select_target(
        &self,
        candidates: &[EndpointCandidate],
    ) -> Result<(EndpointCandidate, LatencyResult)> {
        let mut best: Option<(&EndpointCandidate, LatencyResult)> = None;

        for candidate in candidates {
            let probe = self.latency.measure(&candidate.address, 1);
            match tokio::time::timeout(self.settings.probe_timeout(), probe).await {
                Ok(Ok(result)) => {
                    debug!(candidate = %candidate.label, average_ms = result.average_ms, "Target responded");
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, current)| result.average_ms < current.average_ms);
                    if better {
                        best = Some((candidate, result));
                    }
                }
                Ok(Err(e)) => debug!(candidate = %candidate.label, error = %e, "Target unreachable"),
                Err(_) => debug!(candidate = %candidate.label, "Target probe timed out"),
            }
        }

        best.map(|(candidate, result)| (candidate.clone(), result))
            .ok_or(TuneError::NoReachableTarget {
                candidates: candidates.len(),
            })
    }

    /// First download URL that answers a check
    pub async fn select_download_endpoint(&self) -> Option<String> {
        let throughput = &self.throughput;
        let limit = self.settings.probe_timeout();
        select_first_reachable(&self.settings.download_urls, |url| async move {
            tokio::time::timeout(limit, throughput.check(url))
                .await
                .unwrap_or(false)
        })
        .await
        .cloned()
    }

    /// Baseline, optional optimize step, after.
    ///
    /// Fatal errors (no reachable target, unmeasurable latency, cancellation)
    /// are emitted as `Error` and returned; otherwise `DiagnosticsDone`
    /// carries the result. A failing optimize step only clears
    /// `optimization_applied`.
    pub async fn diagnose(
        &self,
        candidates: &[EndpointCandidate],
        optimize: Option<&OptimizeStep>,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<DiagnosticsRun> {
        match self.run_rounds(candidates, optimize, sink, cancel).await {
            Ok(run) => {
                info!(
                    target_label = %run.target_label,
                    baseline = run.baseline.stability,
                    after = run.after.stability,
                    "Diagnostics finished"
                );
                sink.emit(PipelineEvent::DiagnosticsDone(run.clone()));
                Ok(run)
            }
            Err(e) => {
                warn!(error = %e, "Diagnostics aborted");
                sink.emit(PipelineEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_rounds(
        &self,
        candidates: &[EndpointCandidate],
        optimize: Option<&OptimizeStep>,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<DiagnosticsRun> {
        let started_at = Utc::now();

        sink.emit(PipelineEvent::Phase("Network".to_string()));
        sink.emit(PipelineEvent::Status("Selecting fastest target".to_string()));
        let (target, probe) = self.select_target(candidates).await?;
        sink.emit(PipelineEvent::log(
            LogLevel::Info,
            format!("Target: {} ({}) {}ms", target.label, target.address, probe.average_ms),
        ));

        let endpoint = self.select_download_endpoint().await;
        match &endpoint {
            Some(url) => sink.emit(PipelineEvent::log(LogLevel::Info, format!("Download endpoint: {}", url))),
            None => {
                warn!("No download endpoint reachable; throughput scores as 0 Mbps");
                sink.emit(PipelineEvent::log(
                    LogLevel::Warning,
                    "No download endpoint reachable; speed scored as 0 Mbps",
                ));
            }
        }
        sink.emit(PipelineEvent::Progress(TARGET_SELECTED_PROGRESS));

        check_cancelled(cancel)?;
        sink.emit(PipelineEvent::Status("Measuring baseline".to_string()));
        let baseline = self.measure_round(&target, endpoint.as_deref(), 0, sink).await?;

        check_cancelled(cancel)?;
        let optimization_applied = match optimize {
            Some(step) => self.run_optimize(step, sink).await,
            None => false,
        };

        check_cancelled(cancel)?;
        sink.emit(PipelineEvent::Phase("Network".to_string()));
        sink.emit(PipelineEvent::Status("Measuring after".to_string()));
        let after = self.measure_round(&target, endpoint.as_deref(), 1, sink).await?;

        Ok(DiagnosticsRun {
            target_label: target.label,
            download_endpoint: endpoint,
            baseline,
            after,
            optimization_applied,
            started_at,
        })
    }

    /// One latency + throughput measurement against fixed target and endpoint
    async fn measure_round(
        &self,
        target: &EndpointCandidate,
        endpoint: Option<&str>,
        round: usize,
        sink: &dyn EventSink,
    ) -> Result<TestResult> {
        let progress = |milestone: usize| PipelineEvent::Progress(((round * 100 + milestone) / ROUNDS) as u8);

        let latency = self
            .latency
            .measure(&target.address, self.settings.ping_count);
        let latency = match tokio::time::timeout(self.settings.ping_timeout(), latency).await {
            Ok(Ok(result)) => result,
            Ok(Err(TuneError::LatencyUnavailable(reason))) => {
                return Err(TuneError::LatencyUnavailable(reason))
            }
            Ok(Err(e)) => return Err(TuneError::LatencyUnavailable(e.to_string())),
            Err(_) => {
                return Err(TuneError::LatencyUnavailable(format!(
                    "{} did not answer within {}s",
                    target.address, self.settings.ping_timeout_sec
                )))
            }
        };
        sink.emit(PipelineEvent::Substatus(format!(
            "Latency {}ms, jitter {}ms, loss {}%",
            latency.average_ms, latency.jitter_ms, latency.packet_loss_pct
        )));
        sink.emit(progress(LATENCY_MILESTONE));

        let (download_mbps, throughput_available) = match endpoint {
            Some(url) => self.measure_throughput(url).await,
            None => (0.0, false),
        };
        sink.emit(PipelineEvent::Substatus(format!("Download {:.2} Mbps", download_mbps)));
        sink.emit(progress(THROUGHPUT_MILESTONE));

        let stability = stability_score(&latency, download_mbps);
        if !throughput_available {
            warn!(
                stability,
                "Stability includes a zero speed component for an unavailable throughput reading"
            );
        }
        sink.emit(progress(SCORED_MILESTONE));

        Ok(TestResult {
            latency,
            download_mbps,
            stability,
            throughput_available,
        })
    }

    /// Degrades to a zero reading on any failure
    async fn measure_throughput(&self, url: &str) -> (f64, bool) {
        let window = self.settings.transfer_window();
        // Extra headroom over the transfer window for connection setup
        let limit = window + self.settings.probe_timeout();

        match tokio::time::timeout(limit, self.throughput.measure(url, window)).await {
            Ok(Ok(mbps)) => (mbps, true),
            Ok(Err(e)) => {
                warn!(url, error = %e, "Throughput measurement failed");
                (0.0, false)
            }
            Err(_) => {
                warn!(url, "Throughput measurement timed out");
                (0.0, false)
            }
        }
    }

    async fn run_optimize(&self, step: &OptimizeStep, sink: &dyn EventSink) -> bool {
        sink.emit(PipelineEvent::Phase("Optimize".to_string()));
        sink.emit(PipelineEvent::Status("Applying network safe reset".to_string()));

        if !step.executor.supports(&step.action_id) {
            let err = TuneError::UnknownAction(step.action_id.clone());
            warn!(error = %err, "Optimize step skipped");
            sink.emit(PipelineEvent::log(LogLevel::Warning, err.to_string()));
            return false;
        }

        match perform_bounded(step.executor.as_ref(), &step.action_id).await {
            Ok(report) => {
                sink.emit(PipelineEvent::Substatus(
                    report.detail.unwrap_or_else(|| "Optimization applied".to_string()),
                ));
                sink.emit(PipelineEvent::log(
                    LogLevel::Info,
                    format!("OK   | Optimize | {}", step.action_id),
                ));
                true
            }
            Err(e) => {
                warn!(action = %step.action_id, error = %e, "Optimize step failed");
                sink.emit(PipelineEvent::Substatus(format!("Non-blocking error: {}", e)));
                sink.emit(PipelineEvent::log(
                    LogLevel::Warning,
                    format!("ERR  | Optimize | {} | {}", step.action_id, e),
                ));
                false
            }
        }
    }
}

fn check_cancelled(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(TuneError::Cancelled)
    } else {
        Ok(())
    }
}

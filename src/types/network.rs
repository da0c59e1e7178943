//! Network diagnostics value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A probe target: display label plus host or address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub label: String,
    pub address: String,
}

impl EndpointCandidate {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
        }
    }
}

/// Outcome of one echo round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyResult {
    pub average_ms: u32,
    pub jitter_ms: u32,
    /// Always within 0..=100
    pub packet_loss_pct: u32,
}

/// One full measurement: latency, throughput and the derived score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub latency: LatencyResult,
    pub download_mbps: f64,
    /// Always within 0..=100
    pub stability: u32,
    /// False when no download endpoint answered and `download_mbps` is the
    /// degraded zero reading
    pub throughput_available: bool,
}

/// Baseline and after measurements bracketing an optional optimize step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsRun {
    pub target_label: String,
    pub download_endpoint: Option<String>,
    pub baseline: TestResult,
    pub after: TestResult,
    pub optimization_applied: bool,
    pub started_at: DateTime<Utc>,
}

impl DiagnosticsRun {
    /// Signed change in stability from baseline to after
    pub fn stability_delta(&self) -> i64 {
        self.after.stability as i64 - self.baseline.stability as i64
    }

    /// Signed change in average latency (negative is better)
    pub fn latency_delta_ms(&self) -> i64 {
        self.after.latency.average_ms as i64 - self.baseline.latency.average_ms as i64
    }
}

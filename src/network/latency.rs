//! Echo latency measurement
//!
//! `PingProbe` shells out to the system `ping` and parses its text output.
//! Both the Windows format (`time=12ms`, `time<1ms`, `Average = 12ms`,
//! `(0% loss)`) and the Unix format (`time=12.3 ms`,
//! `rtt min/avg/max/mdev = ...`, `0% packet loss`) are understood.

use crate::actions::process::run_command;
use crate::errors::{Result, TuneError};
use crate::types::LatencyResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Measures round-trip latency to an address
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    /// Send `count` echo requests to `address`
    async fn measure(&self, address: &str, count: u32) -> Result<LatencyResult>;
}

/// Figures extracted from one ping invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingSummary {
    pub samples: Vec<u32>,
    pub reported_average: Option<u32>,
    pub loss_pct: Option<u32>,
}

impl PingSummary {
    /// Reduce to a `LatencyResult`.
    ///
    /// The reported average wins over the sample mean. Jitter is the sample
    /// spread, 0 with fewer than two samples. Missing loss reads as 0%.
    pub fn into_latency(self, address: &str) -> Result<LatencyResult> {
        let average_ms = match (self.reported_average, self.samples.is_empty()) {
            (Some(avg), _) => avg,
            (None, false) => {
                let sum: u64 = self.samples.iter().map(|&s| s as u64).sum();
                (sum / self.samples.len() as u64) as u32
            }
            (None, true) => {
                return Err(TuneError::LatencyUnavailable(format!(
                    "no replies from {}",
                    address
                )))
            }
        };

        let jitter_ms = match (self.samples.iter().max(), self.samples.iter().min()) {
            (Some(max), Some(min)) if self.samples.len() >= 2 => max - min,
            _ => 0,
        };

        Ok(LatencyResult {
            average_ms,
            jitter_ms,
            packet_loss_pct: self.loss_pct.unwrap_or(0).min(100),
        })
    }
}

/// Parse the text output of `ping`
pub fn parse_ping_output(output: &str) -> PingSummary {
    let mut summary = PingSummary::default();

    for line in output.lines() {
        let lower = line.to_ascii_lowercase();

        if let Some(sample) = parse_sample(&lower) {
            summary.samples.push(sample);
        } else if let Some(avg) = parse_reported_average(&lower) {
            summary.reported_average = Some(avg);
        }

        if lower.contains("loss") {
            if let Some(loss) = parse_loss(&lower) {
                summary.loss_pct = Some(loss);
            }
        }
    }

    summary
}

/// `time=12ms`, `time=12.3 ms`, `time<1ms`
fn parse_sample(line: &str) -> Option<u32> {
    if line.contains("time<1ms") {
        return Some(1);
    }
    let idx = line.find("time=")?;
    let rest = &line[idx + 5..];
    let ms_idx = rest.find("ms")?;
    parse_millis(rest[..ms_idx].trim())
}

/// Windows `Average = 12ms` or Unix `rtt min/avg/max/mdev = 1.1/2.2/3.3/0.4 ms`
fn parse_reported_average(line: &str) -> Option<u32> {
    if let Some(idx) = line.find("average =") {
        let rest = &line[idx + 9..];
        let end = rest.find("ms").unwrap_or(rest.len());
        return parse_millis(rest[..end].trim());
    }

    if line.contains("min/avg/max") {
        let (_, values) = line.split_once('=')?;
        let avg = values.trim().split('/').nth(1)?;
        return parse_millis(avg.trim());
    }

    None
}

/// The number directly before the first `%` on a loss line
fn parse_loss(line: &str) -> Option<u32> {
    let pct = line.find('%')?;
    let head = &line[..pct];
    let start = head
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let value: f64 = head[start..].parse().ok()?;
    Some(value.round().clamp(0.0, 100.0) as u32)
}

fn parse_millis(text: &str) -> Option<u32> {
    let value: f64 = text.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u32)
    } else {
        None
    }
}

/// Latency probe backed by the system `ping` binary
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Program and argv for `count` echoes to `address`
    pub fn command_for(address: &str, count: u32) -> (String, Vec<String>) {
        let count = count.max(1).to_string();
        let args = if cfg!(windows) {
            vec!["-n".to_string(), count, address.to_string()]
        } else {
            vec!["-c".to_string(), count, address.to_string()]
        };
        ("ping".to_string(), args)
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

#[async_trait]
impl LatencyProbe for PingProbe {
    async fn measure(&self, address: &str, count: u32) -> Result<LatencyResult> {
        let (program, args) = Self::command_for(address, count);
        let output = run_command(&program, &args, self.timeout)
            .await
            .map_err(|e| TuneError::LatencyUnavailable(format!("{}: {}", address, e)))?;

        debug!(address, exit_code = output.exit_code, "Ping finished");
        parse_ping_output(&output.stdout).into_latency(address)
    }
}

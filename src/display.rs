//! Console reporter
//!
//! Drains the event stream from a session worker and renders it: a progress
//! bar for the run, colored log lines, and a final summary (or JSON).

use crate::cli::Verbosity;
use crate::pipeline::{LogLevel, PipelineEvent};
use crate::profiler::Profile;
use crate::types::{DiagnosticsRun, HardwareSnapshot, RunStats, Task, TestResult};
use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Terminal rendering of session events
pub struct Reporter {
    verbosity: Verbosity,
    json: bool,
    show_progress_bars: bool,
    bar: Option<ProgressBar>,
    phase: String,
    error_reported: bool,
}

impl Reporter {
    pub fn new(verbosity: Verbosity, json: bool) -> Self {
        Self {
            verbosity,
            json,
            show_progress_bars: true,
            bar: None,
            phase: String::new(),
            error_reported: false,
        }
    }

    pub fn with_progress_bars(mut self, enabled: bool) -> Self {
        self.show_progress_bars = enabled;
        self
    }

    /// Render events until the worker drops its sender
    pub async fn consume(&mut self, mut receiver: UnboundedReceiver<PipelineEvent>) {
        while let Some(event) = receiver.recv().await {
            self.handle(event);
        }
        self.finish_bar();
    }

    /// Render one event
    pub fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::ProfileReady(profile) => {
                if !self.json && self.verbosity.show_progress() {
                    self.println(format!("{} {}", "→".cyan(), profile.tagline.bold()));
                }
            }
            PipelineEvent::Phase(phase) => self.phase = phase,
            PipelineEvent::Status(status) => {
                let message = format!("[{}] {}", self.phase, status);
                if let Some(bar) = self.progress_bar() {
                    bar.set_message(message);
                } else if self.verbosity.show_events() && !self.json {
                    println!("{} {}", "→".cyan(), message);
                }
            }
            PipelineEvent::Substatus(text) => {
                if self.verbosity.show_events() && !self.json {
                    self.println(format!("    {}", text.dimmed()));
                }
            }
            PipelineEvent::Progress(pct) => {
                if let Some(bar) = self.progress_bar() {
                    bar.set_position(pct as u64);
                }
            }
            PipelineEvent::Log { level, message } => self.show_log(level, &message),
            PipelineEvent::Done(stats) => {
                self.finish_bar();
                self.show_run_summary(&stats);
            }
            PipelineEvent::DiagnosticsDone(run) => {
                self.finish_bar();
                self.show_diagnostics(&run);
            }
            PipelineEvent::Error(message) => self.show_error(&message),
        }
    }

    /// Render a fatal error; later calls are ignored so a run reports at most one
    pub fn show_error(&mut self, message: &str) {
        if self.error_reported {
            return;
        }
        self.error_reported = true;
        self.finish_bar();
        if self.json {
            println!("{}", json!({ "error": message }));
        } else {
            eprintln!("{} {}", "Error:".red().bold(), message.red());
        }
    }

    /// Whether a fatal error has already been shown
    pub fn error_reported(&self) -> bool {
        self.error_reported
    }

    fn show_log(&self, level: LogLevel, message: &str) {
        if self.json {
            return;
        }
        let visible = match level {
            LogLevel::Info => self.verbosity.show_events(),
            LogLevel::Warning | LogLevel::Error => self.verbosity.show_progress(),
        };
        if !visible {
            return;
        }

        let stamp = Local::now().format("%H:%M:%S").to_string();
        let line = match level {
            LogLevel::Info => format!("{} {}", stamp.dimmed(), message),
            LogLevel::Warning => format!("{} {}", stamp.dimmed(), message.yellow()),
            LogLevel::Error => format!("{} {}", stamp.dimmed(), message.red()),
        };
        self.println(line);
    }

    /// Lazily create the run progress bar
    fn progress_bar(&mut self) -> Option<&ProgressBar> {
        if self.json || !self.show_progress_bars || !self.verbosity.show_progress() {
            return None;
        }
        if self.bar.is_none() {
            let pb = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.green/blue}] {pos}% | {msg}")
            {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            self.bar = Some(pb);
        }
        self.bar.as_ref()
    }

    fn finish_bar(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Print above the progress bar when one is active
    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    pub fn show_run_summary(&self, stats: &RunStats) {
        if self.json {
            println!("{}", serde_json::to_string_pretty(stats).unwrap_or_default());
            return;
        }
        println!();
        println!("{} {}", "✓".green().bold(), "Tune-up complete".green().bold());
        for line in summary_lines(stats) {
            println!("  {}", line);
        }
        println!();
    }

    pub fn show_diagnostics(&self, run: &DiagnosticsRun) {
        if self.json {
            println!("{}", serde_json::to_string_pretty(run).unwrap_or_default());
            return;
        }
        println!();
        println!("{}", format!("Network diagnostics: {}", run.target_label).bold().cyan());
        println!("{}", "-".repeat(60).cyan());
        println!("  {:<9} {}", "Baseline", result_line(&run.baseline));
        println!("  {:<9} {}", "After", result_line(&run.after));

        let delta = run.stability_delta();
        let delta_text = format!("{:+}", delta);
        let delta_text = if delta > 0 {
            delta_text.green()
        } else if delta < 0 {
            delta_text.red()
        } else {
            delta_text.normal()
        };
        println!(
            "  Stability change: {} | Latency change: {:+}ms | Optimization: {}",
            delta_text,
            run.latency_delta_ms(),
            if run.optimization_applied { "applied".green() } else { "not applied".dimmed() }
        );
        if let Some(url) = &run.download_endpoint {
            println!("  {}", format!("Download endpoint: {}", url).dimmed());
        }
        println!();
    }

    pub fn show_profile(&self, snapshot: &HardwareSnapshot, profile: &Profile) {
        if self.json {
            let value = json!({ "hardware": snapshot, "profile": profile });
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            return;
        }
        println!("{}", "System profile".bold().cyan());
        println!("{}", "-".repeat(60).cyan());
        println!("  {} {}", "•".cyan(), snapshot.summary());
        println!("  {} Tier: {} (score {:.1})", "•".cyan(), profile.tier.to_string().bold(), profile.score);
        println!("  {} Focus: {}", "•".cyan(), profile.focus_labels());
        println!("  {} Free disk: {}GB", "•".cyan(), profile.disk_free_gb);
        println!("\n{}", profile.tagline);
    }

    pub fn show_tasks(&self, tasks: &[Task]) {
        if self.json {
            println!("{}", serde_json::to_string_pretty(tasks).unwrap_or_default());
            return;
        }
        println!("{}", "Task catalog".bold().cyan());
        println!("{}", "-".repeat(60).cyan());
        for (index, task) in tasks.iter().enumerate() {
            let marker = if task.safe { "".normal() } else { " [aggressive]".yellow() };
            println!(
                "  {}. {:<12} {}{} {}",
                (index + 1).to_string().cyan(),
                task.phase,
                task.name,
                marker,
                format!("({})", task.action_id).dimmed()
            );
        }
    }
}

/// Plain summary lines for a finished run
pub fn summary_lines(stats: &RunStats) -> Vec<String> {
    vec![
        format!(
            "Applied: {} | Skipped: {} | Errors: {}",
            stats.applied, stats.skipped, stats.errors
        ),
        format!("Cleaned: {} MB", stats.cleaned_mb()),
        format!("Time: {}", format_duration(stats.duration)),
    ]
}

/// One-line rendering of a measurement
pub fn result_line(result: &TestResult) -> String {
    let speed = if result.throughput_available {
        format!("{:.2} Mbps", result.download_mbps)
    } else {
        "n/a".to_string()
    };
    format!(
        "{}ms avg | {}ms jitter | {}% loss | {} | stability {}/100",
        result.latency.average_ms,
        result.latency.jitter_ms,
        result.latency.packet_loss_pct,
        speed,
        result.stability
    )
}

fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms > 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LatencyResult;

    #[test]
    fn test_summary_lines() {
        let stats = RunStats {
            cleaned_bytes: 3 * 1024 * 1024,
            applied: 15,
            skipped: 2,
            errors: 1,
            duration: Duration::from_millis(2500),
        };
        let lines = summary_lines(&stats);
        assert_eq!(lines[0], "Applied: 15 | Skipped: 2 | Errors: 1");
        assert_eq!(lines[1], "Cleaned: 3 MB");
        assert_eq!(lines[2], "Time: 2.5s");
    }

    #[test]
    fn test_result_line_unavailable_throughput() {
        let result = TestResult {
            latency: LatencyResult {
                average_ms: 20,
                jitter_ms: 4,
                packet_loss_pct: 0,
            },
            download_mbps: 0.0,
            stability: 68,
            throughput_available: false,
        };
        let line = result_line(&result);
        assert!(line.contains("n/a"));
        assert!(line.contains("stability 68/100"));
    }

    #[test]
    fn test_error_reported_once() {
        let mut reporter = Reporter::new(Verbosity::Quiet, false).with_progress_bars(false);
        assert!(!reporter.error_reported());

        reporter.handle(PipelineEvent::Error("Run cancelled before completion".to_string()));
        assert!(reporter.error_reported());

        // A later fallback report is suppressed
        reporter.show_error("Worker failed: task panicked");
        assert!(reporter.error_reported());
    }

    #[test]
    fn test_progress_events_do_not_mark_error() {
        let mut reporter = Reporter::new(Verbosity::Quiet, false).with_progress_bars(false);
        reporter.handle(PipelineEvent::Progress(50));
        reporter.handle(PipelineEvent::Done(RunStats::default()));
        assert!(!reporter.error_reported());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(61_000)), "61.0s");
    }

    #[test]
    fn test_quiet_reporter_handles_every_event() {
        let mut reporter = Reporter::new(Verbosity::Quiet, false);
        reporter.handle(PipelineEvent::Phase("Cleanup".into()));
        reporter.handle(PipelineEvent::Status("Purge".into()));
        reporter.handle(PipelineEvent::Progress(50));
        reporter.handle(PipelineEvent::log(LogLevel::Info, "OK   | Cleanup | Purge"));
        assert!(reporter.bar.is_none());
        assert_eq!(reporter.phase, "Cleanup");
    }

    #[test]
    fn test_progress_bar_created_and_finished() {
        let mut reporter = Reporter::new(Verbosity::Normal, false);
        reporter.handle(PipelineEvent::Progress(40));
        assert_eq!(reporter.bar.as_ref().map(|b| b.position()), Some(40));

        reporter.handle(PipelineEvent::Done(RunStats::default()));
        assert!(reporter.bar.is_none());
    }

    #[test]
    fn test_json_mode_has_no_bar() {
        let mut reporter = Reporter::new(Verbosity::Normal, true);
        reporter.handle(PipelineEvent::Progress(40));
        assert!(reporter.bar.is_none());
    }
}

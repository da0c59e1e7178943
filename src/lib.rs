//! tunekit - System tune-up and network diagnostics core
//!
//! Profiles a machine, runs a gated sequential pipeline of tune-up tasks
//! against a pluggable action executor, and measures connection quality
//! before and after an optional network reset.
//!
//! # Architecture
//!
//! - **profiler**: hardware snapshot → tier, focus areas, tagline
//! - **actions**: action id → handler table behind `ActionExecutor`
//! - **pipeline**: ordered task runner with safe/aggressive gating and events
//! - **network**: target selection, latency, throughput, stability scoring
//! - **execution**: sessions that run the above on a worker task

pub mod errors;
pub mod types;

pub mod actions;
pub mod network;
pub mod pipeline;
pub mod profiler;

pub mod cli;
pub mod config;
pub mod display;
pub mod execution;

// Re-export commonly used types
pub use errors::{Result, TuneError};
pub use network::NetworkDiagnosticsEngine;
pub use pipeline::{TaskPipeline, RunConfig};
pub use profiler::SystemProfiler;

//! Shared data types
//!
//! Value types owned by a single profiling, pipeline or diagnostics run.

pub mod hardware;
pub mod network;
pub mod run;

// Re-export commonly used types
pub use hardware::{GpuClass, HardwareSnapshot, StorageClass};
pub use network::{DiagnosticsRun, EndpointCandidate, LatencyResult, TestResult};
pub use run::{RunStats, Task, TaskOutcome};

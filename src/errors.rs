//! Error types for tunekit
//!
//! One crate-wide error enum. Variants are grouped by how far they are
//! allowed to travel: per-task failures stay inside the pipeline fold,
//! fatal errors abort a run before any summary is produced.

use thiserror::Error;

/// Main error type for profiling, pipeline and diagnostics operations
#[derive(Error, Debug)]
pub enum TuneError {
    /// A task or optimize step references an action nobody registered
    #[error("Unknown action id: {0}")]
    UnknownAction(String),

    /// Argument validation: a pipeline needs at least one task
    #[error("Task pipeline is empty")]
    EmptyPipeline,

    /// An action ran and reported failure
    #[error("Action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },

    /// Bounded call exceeded its budget
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Hardware profiling could not produce a snapshot
    #[error("Profiling failed: {0}")]
    Profiling(String),

    /// Every probe candidate was exhausted without a response
    #[error("No reachable target among {candidates} candidate(s)")]
    NoReachableTarget { candidates: usize },

    /// Echo probe produced neither samples nor a reported average
    #[error("Latency unavailable: {0}")]
    LatencyUnavailable(String),

    /// Cooperative cancellation was requested between steps
    #[error("Run cancelled before completion")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Worker task could not be joined
    #[error("Worker failed: {0}")]
    WorkerError(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for tunekit operations
pub type Result<T> = std::result::Result<T, TuneError>;

impl TuneError {
    /// Whether this error aborts a whole run rather than a single step.
    ///
    /// Per-action failures and timeouts are recovered by the pipeline;
    /// everything describing the run itself (validation, profiling,
    /// exhausted candidates, cancellation) is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TuneError::ActionFailed { .. }
                | TuneError::Timeout { .. }
                | TuneError::IoError(_)
                | TuneError::HttpError(_)
                | TuneError::Generic(_)
        )
    }

    /// Shorthand for building an `ActionFailed`
    pub fn action_failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        TuneError::ActionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

/// Convert anyhow errors to TuneError
impl From<anyhow::Error> for TuneError {
    fn from(err: anyhow::Error) -> Self {
        TuneError::Generic(err.to_string())
    }
}

impl From<tokio::task::JoinError> for TuneError {
    fn from(err: tokio::task::JoinError) -> Self {
        TuneError::WorkerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TuneError::Timeout { duration_ms: 12000 };
        assert!(err.to_string().contains("12000"));

        let err = TuneError::action_failed("flush_dns", "exit code 1");
        assert!(err.to_string().contains("flush_dns"));
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(TuneError::EmptyPipeline.is_fatal());
        assert!(TuneError::UnknownAction("x".into()).is_fatal());
        assert!(TuneError::Profiling("probe".into()).is_fatal());
        assert!(TuneError::NoReachableTarget { candidates: 3 }.is_fatal());
        assert!(TuneError::Cancelled.is_fatal());

        assert!(!TuneError::Timeout { duration_ms: 5 }.is_fatal());
        assert!(!TuneError::action_failed("a", "b").is_fatal());
    }

    #[test]
    fn test_from_anyhow() {
        let err: TuneError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}

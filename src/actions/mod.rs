//! Action execution seam
//!
//! Every OS-level effect the pipeline can trigger goes through
//! `ActionExecutor::perform`. Failures come back as `Err` values and are
//! folded by the caller; nothing here unwinds across a task boundary.
//!
//! - `registry`: action id → handler table, resolved before a run starts
//! - `kinds`: the configurable action kinds (purge, commands, noop)
//! - `process`: bounded external command runner

pub mod kinds;
pub mod process;
pub mod registry;

pub use kinds::{ActionSpec, CommandMode, CommandStep};
pub use registry::{ActionRegistry, DryRunExecutor};

use crate::errors::{Result, TuneError};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Per-call bound used when an action declares none
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// What an action reports back on success
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectReport {
    /// Bytes released by cleanup actions
    pub bytes_freed: Option<u64>,

    /// Substatus line for the reporter
    pub detail: Option<String>,
}

impl EffectReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes_freed = Some(bytes);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Performs OS-level effects by action id
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run the action. Callers wrap this in `timeout_for(action_id)`.
    async fn perform(&self, action_id: &str) -> Result<EffectReport>;

    /// Whether `action_id` can be performed; checked before a run starts
    fn supports(&self, action_id: &str) -> bool;

    /// Upper bound for one call of `action_id`
    fn timeout_for(&self, _action_id: &str) -> Duration {
        DEFAULT_ACTION_TIMEOUT
    }
}

/// Call `perform` inside the failure boundary shared by every caller.
///
/// The call is bounded by `timeout_for(action_id)`; an elapsed bound becomes
/// `Timeout` and a panicking handler becomes `ActionFailed`, so the caller
/// only ever sees a `Result`.
pub async fn perform_bounded(executor: &dyn ActionExecutor, action_id: &str) -> Result<EffectReport> {
    let limit = executor.timeout_for(action_id);
    let call = AssertUnwindSafe(executor.perform(action_id)).catch_unwind();

    match tokio::time::timeout(limit, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(TuneError::action_failed(action_id, "action panicked")),
        Err(_) => Err(TuneError::Timeout {
            duration_ms: limit.as_millis() as u64,
        }),
    }
}

/// A single registered effect
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self) -> Result<EffectReport>;
}

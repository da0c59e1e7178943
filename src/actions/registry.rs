//! Action registry
//!
//! Maps action ids to handlers. Built once from configuration (or by hand in
//! tests); the pipeline asks `supports` for every task before running, so an
//! unknown id fails the run up front instead of halfway through.

use super::kinds::ActionSpec;
use super::{ActionExecutor, ActionHandler, EffectReport, DEFAULT_ACTION_TIMEOUT};
use crate::errors::{Result, TuneError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

struct RegisteredAction {
    handler: Arc<dyn ActionHandler>,
    timeout: Duration,
    description: Option<String>,
}

/// Action id → handler table
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
    default_timeout: Duration,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            default_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    /// Bound applied to actions that declare none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Build a registry from configured action definitions
    pub fn from_specs(specs: &BTreeMap<String, ActionSpec>, default_timeout: Duration) -> Self {
        let mut registry = Self::new().with_default_timeout(default_timeout);
        for (id, spec) in specs {
            registry.register_spec(id.clone(), spec.clone());
        }
        tracing::debug!("Registered {} action(s)", registry.len());
        registry
    }

    /// Register a configured definition under `id`
    pub fn register_spec(&mut self, id: impl Into<String>, spec: ActionSpec) {
        let timeout = spec.timeout(self.default_timeout);
        let description = spec.description().map(str::to_string);
        self.actions.insert(
            id.into(),
            RegisteredAction {
                handler: Arc::from(spec.into_handler()),
                timeout,
                description,
            },
        );
    }

    /// Register an arbitrary handler
    pub fn register(
        &mut self,
        id: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
        timeout: Option<Duration>,
    ) {
        self.actions.insert(
            id.into(),
            RegisteredAction {
                handler,
                timeout: timeout.unwrap_or(self.default_timeout),
                description: None,
            },
        );
    }

    /// Register a synchronous closure; it runs on the blocking pool
    pub fn register_fn<F>(&mut self, id: impl Into<String>, timeout: Option<Duration>, f: F)
    where
        F: Fn() -> Result<EffectReport> + Send + Sync + 'static,
    {
        self.register(id, Arc::new(FnAction { f: Arc::new(f) }), timeout);
    }

    /// Fail with `UnknownAction` for the first id that is not registered
    pub fn resolve_all<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for id in ids {
            if !self.contains(id) {
                return Err(TuneError::UnknownAction(id.to_string()));
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    pub fn description(&self, id: &str) -> Option<&str> {
        self.actions.get(id).and_then(|a| a.description.as_deref())
    }

    /// Registered ids, sorted
    pub fn action_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.actions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[async_trait]
impl ActionExecutor for ActionRegistry {
    async fn perform(&self, action_id: &str) -> Result<EffectReport> {
        let action = self
            .actions
            .get(action_id)
            .ok_or_else(|| TuneError::UnknownAction(action_id.to_string()))?;
        action.handler.run().await
    }

    fn supports(&self, action_id: &str) -> bool {
        self.contains(action_id)
    }

    fn timeout_for(&self, action_id: &str) -> Duration {
        self.actions
            .get(action_id)
            .map(|a| a.timeout)
            .unwrap_or(self.default_timeout)
    }
}

struct FnAction {
    f: Arc<dyn Fn() -> Result<EffectReport> + Send + Sync>,
}

#[async_trait]
impl ActionHandler for FnAction {
    async fn run(&self) -> Result<EffectReport> {
        let f = Arc::clone(&self.f);
        tokio::task::spawn_blocking(move || f()).await?
    }
}

/// Executor that previews a run: every known action "succeeds" untouched
pub struct DryRunExecutor {
    inner: Arc<dyn ActionExecutor>,
}

impl DryRunExecutor {
    /// Wrap a real executor so ids are still validated against it
    pub fn new(inner: Arc<dyn ActionExecutor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn perform(&self, action_id: &str) -> Result<EffectReport> {
        tracing::info!(action_id, "Dry run: skipping side effects");
        Ok(EffectReport::new().with_detail(format!("Dry run: would perform '{}'", action_id)))
    }

    fn supports(&self, action_id: &str) -> bool {
        self.inner.supports(action_id)
    }

    fn timeout_for(&self, action_id: &str) -> Duration {
        self.inner.timeout_for(action_id)
    }
}

//! Recovery Engine
//!
//! A recovery pass refreshes collaborator state into the store, restores component
//! coherence, pushes the context across the bridge and moves the recovery checkpoint.
//! Passes are serialized: a concurrent `recover()` waits for the running pass. Every
//! pass, successful or not, is appended to a history keyed by a timestamp label.

use crate::collaborator::{StateSource, SyncBridge};
use crate::context::{ComponentStatus, ContextStore};
use crate::error::panic_message;
use crate::telemetry::{EngineEvent, EventBus};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Store key holding the time of the last collaborator refresh.
pub const LAST_REFRESH_KEY: &str = "last_refresh";

pub const STEP_REFRESH: &str = "Collaborator state refresh";
pub const STEP_COHERENCE: &str = "Coherence restoration";
pub const STEP_BRIDGE: &str = "Bridge synchronization";
pub const STEP_CHECKPOINT: &str = "Recovery checkpoint updated";

/// Recovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Coherence below which reconciliation runs
    pub coherence_target: f64,
    /// Upper bound on a single collaborator `get_state` call (milliseconds)
    pub collaborator_timeout_ms: u64,
    /// Number of results kept in the history
    pub history_limit: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            coherence_target: 0.85,
            collaborator_timeout_ms: 2_000,
            history_limit: 500,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.coherence_target) {
            return Err(format!(
                "Recovery coherence_target must be within [0, 1], got {}",
                self.coherence_target
            ));
        }
        if self.collaborator_timeout_ms == 0 {
            return Err("Recovery collaborator_timeout_ms must be greater than 0".to_string());
        }
        if self.history_limit == 0 {
            return Err("Recovery history_limit must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Outcome of one recovery pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub label: String,
    pub snapshot_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps_executed: Vec<String>,
    pub notes: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
    pub restored_coherence: f64,
}

pub struct RecoveryEngine {
    store: Arc<ContextStore>,
    sources: Vec<Arc<dyn StateSource>>,
    bridge: Arc<dyn SyncBridge>,
    bus: EventBus,
    config: RecoveryConfig,
    pass_lock: Mutex<()>,
    history: RwLock<BTreeMap<String, RecoveryResult>>,
    last_recovery_check: RwLock<DateTime<Utc>>,
}

/// Exclusive right to run recovery; held by `recover()` and by snapshot restores.
pub struct RecoveryPass<'a> {
    engine: &'a RecoveryEngine,
    _guard: MutexGuard<'a, ()>,
}

impl RecoveryPass<'_> {
    /// Run the full step sequence while holding the pass lock.
    pub async fn run(&self, snapshot_id: Option<Uuid>) -> RecoveryResult {
        self.engine.execute(snapshot_id).await
    }
}

impl RecoveryEngine {
    pub fn new(
        store: Arc<ContextStore>,
        bridge: Arc<dyn SyncBridge>,
        bus: EventBus,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            store,
            sources: Vec::new(),
            bridge,
            bus,
            config,
            pass_lock: Mutex::new(()),
            history: RwLock::new(BTreeMap::new()),
            last_recovery_check: RwLock::new(Utc::now()),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn StateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn StateSource>>,
    {
        self.sources.extend(sources);
        self
    }

    /// Run a pass, waiting for any pass already in progress.
    pub async fn recover(&self) -> RecoveryResult {
        let pass = self.begin_exclusive().await;
        pass.run(None).await
    }

    /// Acquire the pass lock without running anything yet.
    pub async fn begin_exclusive(&self) -> RecoveryPass<'_> {
        let guard = self.pass_lock.lock().await;
        RecoveryPass {
            engine: self,
            _guard: guard,
        }
    }

    /// Time of the last successful pass (construction time until one succeeds).
    pub fn last_recovery_check(&self) -> DateTime<Utc> {
        *self.last_recovery_check.read()
    }

    /// All recorded results in label (chronological) order.
    pub fn history(&self) -> Vec<RecoveryResult> {
        self.history.read().values().cloned().collect()
    }

    pub fn latest(&self) -> Option<RecoveryResult> {
        self.history
            .read()
            .values()
            .max_by_key(|result| result.start_time)
            .cloned()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    async fn execute(&self, snapshot_id: Option<Uuid>) -> RecoveryResult {
        let start_time = Utc::now();
        let mut steps = Vec::new();
        let mut notes = Vec::new();

        debug!(sources = self.sources.len(), "Recovery pass started");
        let outcome = AssertUnwindSafe(self.run_steps(&mut steps, &mut notes))
            .catch_unwind()
            .await;
        let (success, error) = match outcome {
            Ok(()) => (true, None),
            Err(payload) => (false, Some(panic_message(payload))),
        };

        let mut result = RecoveryResult {
            label: String::new(),
            snapshot_id,
            start_time,
            end_time: Utc::now(),
            steps_executed: steps,
            notes,
            success,
            error,
            restored_coherence: self.store.coherence(),
        };
        result.label = self.record(&result);

        if result.success {
            info!(
                label = %result.label,
                steps = result.steps_executed.len(),
                notes = result.notes.len(),
                coherence = result.restored_coherence,
                "Recovery pass completed"
            );
        } else {
            error!(
                label = %result.label,
                steps = result.steps_executed.len(),
                error = result.error.as_deref().unwrap_or_default(),
                "Recovery pass aborted"
            );
        }
        self.bus.emit(EngineEvent::RecoveryExecuted {
            label: result.label.clone(),
            success: result.success,
            steps: result.steps_executed.clone(),
        });

        result
    }

    async fn run_steps(&self, steps: &mut Vec<String>, notes: &mut Vec<String>) {
        let responded = self.refresh_collaborators(notes).await;
        steps.push(STEP_REFRESH.to_string());

        let coherence = self.store.coherence();
        if coherence < self.config.coherence_target {
            for name in &responded {
                self.store.update_component(name.clone(), ComponentStatus::Connected);
            }
            let restored = self.store.coherence();
            if restored < self.config.coherence_target {
                notes.push(format!(
                    "Coherence {:.2} remains below target {:.2}",
                    restored, self.config.coherence_target
                ));
            }
        }
        steps.push(STEP_COHERENCE.to_string());

        if !self.bridge.push(&self.store.snapshot()).await {
            notes.push("Bridge synchronization failed".to_string());
        }
        steps.push(STEP_BRIDGE.to_string());

        *self.last_recovery_check.write() = Utc::now();
        steps.push(STEP_CHECKPOINT.to_string());
    }

    /// Pull every source's state into `{name}_state`. Returns the names that answered.
    async fn refresh_collaborators(&self, notes: &mut Vec<String>) -> Vec<String> {
        let timeout = Duration::from_millis(self.config.collaborator_timeout_ms);
        let mut responded = Vec::new();

        for source in &self.sources {
            let name = source.name().to_string();
            match tokio::time::timeout(timeout, source.get_state()).await {
                Ok(Ok(state)) => {
                    self.store.update(format!("{}_state", name), state);
                    responded.push(name);
                }
                Ok(Err(e)) => {
                    warn!(source = %name, error = %e, "State source refresh failed");
                    notes.push(format!("{}: {}", name, e));
                }
                Err(_) => {
                    warn!(source = %name, timeout_ms = self.config.collaborator_timeout_ms, "State source timed out");
                    notes.push(format!(
                        "{}: timed out after {}ms",
                        name, self.config.collaborator_timeout_ms
                    ));
                }
            }
        }

        self.store.update(LAST_REFRESH_KEY, Utc::now().to_rfc3339());
        responded
    }

    /// Store `result` under a unique label and trim the oldest entries.
    fn record(&self, result: &RecoveryResult) -> String {
        let base = format!("recovery_{}", result.start_time.format("%Y%m%d_%H%M%S_%3f"));
        let mut history = self.history.write();
        let mut label = base.clone();
        let mut suffix = 1;
        while history.contains_key(&label) {
            label = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        let mut stored = result.clone();
        stored.label = label.clone();
        history.insert(label.clone(), stored);
        while history.len() > self.config.history_limit {
            history.pop_first();
        }
        label
    }
}

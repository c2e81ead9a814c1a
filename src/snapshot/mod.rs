//! Snapshot Manager
//!
//! Point-in-time copies of the context store plus session metadata. Snapshots are
//! handed out as `Arc<Snapshot>` and never mutated; the history is append-only for the
//! lifetime of the process, optionally mirrored into a sled archive.

pub mod archive;

use crate::context::{ComponentState, ContextSnapshot, ContextStore};
use crate::error::EngineError;
use crate::telemetry::{EngineEvent, EventBus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use archive::SnapshotArchive;

/// Store key holding the current development phase.
pub const DEVELOPMENT_PHASE_KEY: &str = "development_phase";
/// Store key holding the active task list (JSON array of strings).
pub const ACTIVE_TASKS_KEY: &str = "active_tasks";
const UNKNOWN_PHASE: &str = "Unknown";

/// Immutable copy of the store taken at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    pub description: Option<String>,
    pub context_copy: BTreeMap<String, Value>,
    pub components: BTreeMap<String, ComponentState>,
    pub coherence: f64,
    pub development_phase: String,
    pub active_tasks: Vec<String>,
}

#[derive(Default)]
struct SnapshotIndex {
    by_id: HashMap<Uuid, Arc<Snapshot>>,
    order: Vec<Uuid>,
}

impl SnapshotIndex {
    fn insert(&mut self, snapshot: Arc<Snapshot>) -> bool {
        if self.by_id.contains_key(&snapshot.id) {
            return false;
        }
        self.order.push(snapshot.id);
        self.by_id.insert(snapshot.id, snapshot);
        true
    }
}

pub struct SnapshotManager {
    store: Arc<ContextStore>,
    bus: EventBus,
    index: RwLock<SnapshotIndex>,
    archive: Option<SnapshotArchive>,
}

impl SnapshotManager {
    pub fn new(store: Arc<ContextStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            index: RwLock::new(SnapshotIndex::default()),
            archive: None,
        }
    }

    /// Mirror every new snapshot into `archive`.
    pub fn with_archive(mut self, archive: SnapshotArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Capture the store with explicit session metadata.
    pub fn create(
        &self,
        trigger: impl Into<String>,
        development_phase: impl Into<String>,
        active_tasks: Vec<String>,
    ) -> Arc<Snapshot> {
        let context = self.store.snapshot();
        self.record(
            context,
            trigger.into(),
            None,
            development_phase.into(),
            active_tasks,
        )
    }

    /// Capture the store, reading phase and tasks from the store itself.
    pub fn capture(&self, trigger: impl Into<String>, description: Option<String>) -> Arc<Snapshot> {
        let context = self.store.snapshot();
        let phase = context
            .entry(DEVELOPMENT_PHASE_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_PHASE.to_string());
        let tasks = context
            .entry(ACTIVE_TASKS_KEY)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        self.record(context, trigger.into(), description, phase, tasks)
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<Snapshot>, EngineError> {
        self.index
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::SnapshotNotFound(id.to_string()))
    }

    /// All snapshots in creation order.
    pub fn list(&self) -> Vec<Arc<Snapshot>> {
        let index = self.index.read();
        index
            .order
            .iter()
            .filter_map(|id| index.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load archived snapshots not already known. Returns how many were added.
    pub fn restore_from_archive(&self) -> Result<usize, EngineError> {
        let Some(archive) = &self.archive else {
            return Ok(0);
        };
        let archived = archive.load_all()?;
        let mut index = self.index.write();
        let added = archived
            .into_iter()
            .filter(|snapshot| index.insert(Arc::new(snapshot.clone())))
            .count();
        info!(added, total = index.order.len(), "Loaded snapshots from archive");
        Ok(added)
    }

    fn record(
        &self,
        context: ContextSnapshot,
        trigger: String,
        description: Option<String>,
        development_phase: String,
        active_tasks: Vec<String>,
    ) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            trigger,
            description,
            context_copy: context.entries,
            components: context.components,
            coherence: context.coherence,
            development_phase,
            active_tasks,
        });

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.put(&snapshot).and_then(|_| archive.flush()) {
                warn!(snapshot_id = %snapshot.id, error = %e, "Failed to archive snapshot");
            }
        }

        self.index.write().insert(Arc::clone(&snapshot));

        debug!(
            snapshot_id = %snapshot.id,
            trigger = %snapshot.trigger,
            entries = snapshot.context_copy.len(),
            coherence = snapshot.coherence,
            "Snapshot created"
        );
        self.bus.emit(EngineEvent::SnapshotCreated {
            snapshot_id: snapshot.id.to_string(),
            trigger: snapshot.trigger.clone(),
            coherence: snapshot.coherence,
        });

        snapshot
    }
}

//! Context Store
//!
//! Thread-safe mapping of keys to JSON values plus per-component status records.
//! Every call takes the store lock exactly once, so reads never observe a
//! half-applied write.

use crate::context::types::{compute_coherence, ComponentState, ComponentStatus, ContextSnapshot};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug)]
struct StoreInner {
    entries: BTreeMap<String, Value>,
    components: BTreeMap<String, ComponentState>,
    last_update: DateTime<Utc>,
}

/// Shared context state owned by the engine.
#[derive(Debug)]
pub struct ContextStore {
    inner: Mutex<StoreInner>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    /// Create an empty store with no tracked components.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: BTreeMap::new(),
                components: BTreeMap::new(),
                last_update: Utc::now(),
            }),
        }
    }

    /// Create a store pre-populated with declared components.
    pub fn with_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = (S, ComponentStatus)>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for (name, status) in components {
                let state = ComponentState::new(name, status);
                inner.components.insert(state.name.clone(), state);
            }
        }
        store
    }

    /// Store a value under `key`, replacing any previous value.
    pub fn update(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let mut inner = self.inner.lock();
        trace!(key = %key, "context entry updated");
        inner.entries.insert(key, value.into());
        inner.last_update = Utc::now();
    }

    /// Write several entries under one lock acquisition.
    pub fn merge<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut inner = self.inner.lock();
        let mut count = 0usize;
        for (key, value) in entries {
            inner.entries.insert(key, value);
            count += 1;
        }
        inner.last_update = Utc::now();
        count
    }

    /// Replace the named component's state with a freshly timestamped record.
    pub fn update_component(&self, name: impl Into<String>, status: ComponentStatus) {
        let state = ComponentState::new(name, status);
        let mut inner = self.inner.lock();
        trace!(component = %state.name, status = %status, "component state replaced");
        inner.components.insert(state.name.clone(), state);
        inner.last_update = Utc::now();
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn component(&self, name: &str) -> Option<ComponentState> {
        self.inner.lock().components.get(name).cloned()
    }

    /// Deep copy of entries, components, last update and coherence.
    pub fn snapshot(&self) -> ContextSnapshot {
        let inner = self.inner.lock();
        ContextSnapshot {
            entries: inner.entries.clone(),
            components: inner.components.clone(),
            last_update: inner.last_update,
            coherence: compute_coherence(inner.components.values()),
        }
    }

    pub fn coherence(&self) -> f64 {
        compute_coherence(self.inner.lock().components.values())
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.inner.lock().last_update
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component_names(&self) -> Vec<String> {
        self.inner.lock().components.keys().cloned().collect()
    }
}

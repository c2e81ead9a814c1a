//! Shared context types: component status records and store copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Status of a tracked component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Active,
    Processing,
    Connected,
    Monitoring,
    Ready,
    Idle,
}

impl ComponentStatus {
    /// Statuses that count toward coherence.
    pub fn is_coherent(self) -> bool {
        matches!(
            self,
            ComponentStatus::Active | ComponentStatus::Processing | ComponentStatus::Connected
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentStatus::Active => "active",
            ComponentStatus::Processing => "processing",
            ComponentStatus::Connected => "connected",
            ComponentStatus::Monitoring => "monitoring",
            ComponentStatus::Ready => "ready",
            ComponentStatus::Idle => "idle",
        }
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status record for a named component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    pub name: String,
    pub status: ComponentStatus,
    pub last_sync: DateTime<Utc>,
}

impl ComponentState {
    pub fn new(name: impl Into<String>, status: ComponentStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_sync: Utc::now(),
        }
    }
}

/// Detached copy of the store taken under a single lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub entries: BTreeMap<String, Value>,
    pub components: BTreeMap<String, ComponentState>,
    pub last_update: DateTime<Utc>,
    pub coherence: f64,
}

impl ContextSnapshot {
    pub fn entry(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of components whose status counts toward coherence.
    pub fn coherent_components(&self) -> usize {
        self.components
            .values()
            .filter(|c| c.status.is_coherent())
            .count()
    }
}

/// Fraction of components in a coherent status; `1.0` when none are tracked.
pub fn compute_coherence<'a, I>(components: I) -> f64
where
    I: IntoIterator<Item = &'a ComponentState>,
{
    let mut total = 0usize;
    let mut coherent = 0usize;
    for component in components {
        total += 1;
        if component.status.is_coherent() {
            coherent += 1;
        }
    }
    if total == 0 {
        1.0
    } else {
        coherent as f64 / total as f64
    }
}

//! Event schema for engine notifications.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Notification raised by an engine component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    SnapshotCreated {
        snapshot_id: String,
        trigger: String,
        coherence: f64,
    },
    RequestEnqueued {
        request_id: String,
        conversation_id: String,
        priority: u8,
    },
    RequestDequeued {
        request_id: String,
    },
    RequestProcessing {
        request_id: String,
    },
    RequestCompleted {
        request_id: String,
        success: bool,
        duration_ms: u128,
    },
    ResponseDiscarded {
        request_id: String,
    },
    HealthChecked {
        score: f64,
        healthy: bool,
        indicators: Vec<String>,
    },
    RecoveryExecuted {
        label: String,
        success: bool,
        steps: Vec<String>,
    },
    BridgeSynced {
        success: bool,
    },
    SessionStarted {
        session_id: String,
        target: String,
        snapshot_id: String,
    },
    SessionCompleted {
        session_id: String,
        status: String,
        context_restored: bool,
    },
    ContextRecovered {
        snapshot_id: String,
        steps: Vec<String>,
        restored_coherence: f64,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::SnapshotCreated { .. } => "snapshot_created",
            EngineEvent::RequestEnqueued { .. } => "request_enqueued",
            EngineEvent::RequestDequeued { .. } => "request_dequeued",
            EngineEvent::RequestProcessing { .. } => "request_processing",
            EngineEvent::RequestCompleted { .. } => "request_completed",
            EngineEvent::ResponseDiscarded { .. } => "response_discarded",
            EngineEvent::HealthChecked { .. } => "health_checked",
            EngineEvent::RecoveryExecuted { .. } => "recovery_executed",
            EngineEvent::BridgeSynced { .. } => "bridge_synced",
            EngineEvent::SessionStarted { .. } => "session_started",
            EngineEvent::SessionCompleted { .. } => "session_completed",
            EngineEvent::ContextRecovered { .. } => "context_recovered",
        }
    }
}

/// Timestamped event as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub ts: String,
    pub event: EngineEvent,
}

impl EventEnvelope {
    pub fn with_now(event: EngineEvent) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        }
    }
}

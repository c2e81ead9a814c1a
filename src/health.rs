//! Health Monitor
//!
//! Scores the context from three signals: context-loss phrases in the latest input,
//! time since the last successful recovery, and component coherence. The periodic tick
//! triggers recovery when the score is unhealthy and otherwise mirrors the context to
//! the bridge.

use crate::collaborator::SyncBridge;
use crate::context::ContextStore;
use crate::recovery::RecoveryEngine;
use crate::telemetry::{EngineEvent, EventBus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Scores at or above this are healthy.
pub const HEALTHY_SCORE: f64 = 0.7;
/// Scores below this need recovery before anything else happens.
pub const IMMEDIATE_RECOVERY_SCORE: f64 = 0.5;

const LOSS_SCORE: f64 = 0.3;
const STALE_SCORE: f64 = 0.6;
const INCOHERENT_SCORE: f64 = 0.5;

pub const ACTION_FULL_RECOVERY: &str = "Execute full context recovery";
pub const ACTION_SCHEDULED_REFRESH: &str = "Execute scheduled context refresh";
pub const ACTION_SYNCHRONIZE: &str = "Synchronize holographic state";

/// Store key holding the outcome of the last bridge push from a healthy tick.
pub const BRIDGE_SYNC_STATUS_KEY: &str = "bridge_sync_status";
/// Store key holding the time of the last bridge push from a healthy tick.
pub const LAST_BRIDGE_SYNC_KEY: &str = "last_bridge_sync";

fn default_loss_keywords() -> Vec<String> {
    [
        "forgetting",
        "losing context",
        "what were we doing",
        "context loss",
        "forgot",
        "lost track",
        "starting over",
    ]
    .iter()
    .map(|keyword| keyword.to_string())
    .collect()
}

/// Health monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Phrases (matched case-insensitively) that signal the user lost context
    pub loss_keywords: Vec<String>,
    /// Time since the last successful recovery before a refresh is due (seconds)
    pub refresh_threshold_secs: u64,
    /// Coherence below which the context counts as incoherent
    pub coherence_threshold: f64,
    /// Period of the background health tick (milliseconds)
    pub check_interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            loss_keywords: default_loss_keywords(),
            refresh_threshold_secs: 48 * 60 * 60,
            coherence_threshold: 0.7,
            check_interval_ms: 5_000,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.coherence_threshold) {
            return Err(format!(
                "Health coherence_threshold must be within [0, 1], got {}",
                self.coherence_threshold
            ));
        }
        if self.check_interval_ms == 0 {
            return Err("Health check_interval_ms must be greater than 0".to_string());
        }
        if self.loss_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err("Health loss_keywords must not contain empty phrases".to_string());
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub score: f64,
    pub indicators: Vec<String>,
    pub recovery_actions: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthResult {
    pub fn is_healthy(&self) -> bool {
        self.score >= HEALTHY_SCORE
    }

    pub fn needs_immediate_recovery(&self) -> bool {
        self.score < IMMEDIATE_RECOVERY_SCORE
    }

    fn degrade(&mut self, ceiling: f64, indicator: String, action: &str) {
        self.score = self.score.min(ceiling);
        self.indicators.push(indicator);
        if !self.recovery_actions.iter().any(|a| a == action) {
            self.recovery_actions.push(action.to_string());
        }
    }
}

pub struct HealthMonitor {
    store: Arc<ContextStore>,
    recovery: Arc<RecoveryEngine>,
    bridge: Arc<dyn SyncBridge>,
    bus: EventBus,
    config: HealthConfig,
    latest_input: Mutex<Option<String>>,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<ContextStore>,
        recovery: Arc<RecoveryEngine>,
        bridge: Arc<dyn SyncBridge>,
        bus: EventBus,
        config: HealthConfig,
    ) -> Self {
        Self {
            store,
            recovery,
            bridge,
            bus,
            config,
            latest_input: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Score the context against `latest_input` without side effects.
    pub fn check_health(&self, latest_input: Option<&str>) -> HealthResult {
        let mut result = HealthResult {
            score: 1.0,
            indicators: Vec::new(),
            recovery_actions: Vec::new(),
            checked_at: Utc::now(),
        };

        if let Some(input) = latest_input {
            let lowered = input.to_lowercase();
            for keyword in &self.config.loss_keywords {
                if lowered.contains(&keyword.to_lowercase()) {
                    result.degrade(
                        LOSS_SCORE,
                        format!("User mentioned: {}", keyword),
                        ACTION_FULL_RECOVERY,
                    );
                }
            }
        }

        let elapsed = (result.checked_at - self.recovery.last_recovery_check())
            .to_std()
            .unwrap_or_default();
        if elapsed > Duration::from_secs(self.config.refresh_threshold_secs) {
            result.degrade(
                STALE_SCORE,
                format!(
                    "Time since last check: {:.1} hours",
                    elapsed.as_secs_f64() / 3600.0
                ),
                ACTION_SCHEDULED_REFRESH,
            );
        }

        let coherence = self.store.coherence();
        if coherence < self.config.coherence_threshold {
            result.degrade(
                INCOHERENT_SCORE,
                format!("Holographic coherence low: {:.2}", coherence),
                ACTION_SYNCHRONIZE,
            );
        }

        result.score = result.score.max(0.0);
        result
    }

    /// Remember the most recent caller input for the next tick.
    pub fn record_input(&self, input: impl Into<String>) {
        *self.latest_input.lock() = Some(input.into());
    }

    /// One periodic check: consume the recorded input, then recover or sync.
    pub async fn tick(&self) -> HealthResult {
        let input = self.latest_input.lock().take();
        let result = self.check_health(input.as_deref());
        let healthy = result.is_healthy();

        self.bus.emit(EngineEvent::HealthChecked {
            score: result.score,
            healthy,
            indicators: result.indicators.clone(),
        });

        if healthy {
            let synced = self.bridge.push(&self.store.snapshot()).await;
            let status = if synced { "synchronized" } else { "failed" };
            self.store.update(BRIDGE_SYNC_STATUS_KEY, status);
            self.store.update(LAST_BRIDGE_SYNC_KEY, Utc::now().to_rfc3339());
            self.bus.emit(EngineEvent::BridgeSynced { success: synced });
            debug!(score = result.score, bridge = status, "Health check passed");
        } else {
            warn!(
                score = result.score,
                indicators = ?result.indicators,
                "Context health degraded, running recovery"
            );
            self.recovery.recover().await;
        }

        result
    }
}

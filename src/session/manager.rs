//! Session lifecycle: start, complete, restore, abandon and the periodic monitor.

use crate::context::ContextStore;
use crate::error::{panic_message, EngineError, IntegrityWarning};
use crate::health::HealthMonitor;
use crate::recovery::{RecoveryEngine, RecoveryPass, RecoveryResult};
use crate::session::types::{
    Integrity, RestoreResult, Session, SessionKind, SessionResult, SessionStatus,
};
use crate::session::SessionConfig;
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::telemetry::{EngineEvent, EventBus};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ACTIVE_DEBUG_SESSION_KEY: &str = "active_debug_session";
pub const DEBUG_MODE_KEY: &str = "debug_mode";
pub const LAST_DEBUG_SESSION_KEY: &str = "last_debug_session";
pub const RESTORING_FROM_SNAPSHOT_KEY: &str = "restoring_from_snapshot";
pub const DEBUG_INSIGHTS_KEY: &str = "debug_insights";
pub const DEBUG_LEARNINGS_KEY: &str = "debug_learnings";
pub const ENHANCED_BY_DEBUG_KEY: &str = "enhanced_by_debug";
pub const DEBUG_ENHANCEMENT_TIMESTAMP_KEY: &str = "debug_enhancement_timestamp";
pub const CONTEXT_RESTORED_KEY: &str = "context_restored";
pub const RESTORATION_TIMESTAMP_KEY: &str = "restoration_timestamp";

#[derive(Default)]
struct RestoreProgress {
    notes: Vec<String>,
    recovery: Option<RecoveryResult>,
    integrity: Option<(Integrity, Option<IntegrityWarning>)>,
}

pub struct SessionManager {
    store: Arc<ContextStore>,
    snapshots: Arc<SnapshotManager>,
    recovery: Arc<RecoveryEngine>,
    health: Arc<HealthMonitor>,
    bus: EventBus,
    config: SessionConfig,
    active: RwLock<HashMap<Uuid, Session>>,
    completed: RwLock<VecDeque<Session>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<ContextStore>,
        snapshots: Arc<SnapshotManager>,
        recovery: Arc<RecoveryEngine>,
        health: Arc<HealthMonitor>,
        bus: EventBus,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            recovery,
            health,
            bus,
            config,
            active: RwLock::new(HashMap::new()),
            completed: RwLock::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session, capturing the context it starts from.
    pub fn start(
        &self,
        target: impl Into<String>,
        description: Option<String>,
        kind: SessionKind,
    ) -> Session {
        let target = target.into();
        let snapshot = self
            .snapshots
            .capture(format!("session start for {}", target), description.clone());
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            target,
            description,
            kind,
            status: SessionStatus::Active,
            start_time: now,
            end_time: None,
            snapshot_id: Some(snapshot.id),
            findings: Vec::new(),
            warnings: Vec::new(),
            context_health: self.health.check_health(None).score,
            last_health_check: Some(now),
        };

        self.active.write().insert(session.id, session.clone());
        self.store
            .update(ACTIVE_DEBUG_SESSION_KEY, session.id.to_string());
        self.store.update(DEBUG_MODE_KEY, true);

        info!(
            session_id = %session.id,
            target = %session.target,
            kind = %session.kind,
            snapshot_id = %snapshot.id,
            "Session started"
        );
        self.bus.emit(EngineEvent::SessionStarted {
            session_id: session.id.to_string(),
            target: session.target.clone(),
            snapshot_id: snapshot.id.to_string(),
        });

        session
    }

    /// Close an active session, optionally restoring its starting snapshot.
    pub async fn complete(
        &self,
        id: Uuid,
        findings: Vec<String>,
        restore_context: bool,
    ) -> Result<SessionResult, EngineError> {
        let mut session = {
            let mut active = self.active.write();
            let session = active
                .get_mut(&id)
                .filter(|session| session.status == SessionStatus::Active)
                .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))?;
            session.status = SessionStatus::Completing;
            session.findings.extend(findings.iter().cloned());
            session.clone()
        };
        debug!(session_id = %id, findings = findings.len(), restore_context, "Completing session");

        let mut context_restored = false;
        let mut recovery_steps = Vec::new();
        let mut recovery_error = None;
        let mut integrity_warning = None;

        if restore_context {
            if let Some(snapshot_id) = session.snapshot_id {
                match self.restore(snapshot_id, &session.findings).await {
                    Ok(restore) => {
                        context_restored = restore.success;
                        recovery_steps = restore.steps_executed;
                        recovery_error = restore.error;
                        integrity_warning = restore.integrity_warning;
                    }
                    Err(e) => recovery_error = Some(e.to_string()),
                }
            }
        }

        let completion_time = Utc::now();
        let success = recovery_error.is_none();
        session.status = if success {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        };
        session.end_time = Some(completion_time);
        if let Some(error) = &recovery_error {
            session.warnings.push(format!("Context restoration failed: {}", error));
        }

        self.active.write().remove(&id);
        self.finish(&session);

        if success {
            info!(session_id = %id, context_restored, "Session completed");
        } else {
            warn!(session_id = %id, error = recovery_error.as_deref().unwrap_or_default(), "Session failed");
        }
        self.bus.emit(EngineEvent::SessionCompleted {
            session_id: id.to_string(),
            status: session.status.to_string(),
            context_restored,
        });

        Ok(SessionResult {
            duration: session.elapsed(),
            findings: session.findings.clone(),
            session,
            completion_time,
            success,
            error: recovery_error.clone(),
            context_restored,
            recovery_steps,
            recovery_error,
            integrity_warning,
        })
    }

    /// Operator-only transition of an active session to `Abandoned`.
    pub fn abandon(&self, id: Uuid, reason: impl Into<String>) -> Result<Session, EngineError> {
        let reason = reason.into();
        let mut session = {
            let mut active = self.active.write();
            match active.get(&id) {
                Some(session) if session.status == SessionStatus::Active => {}
                _ => return Err(EngineError::SessionNotFound(id.to_string())),
            }
            active
                .remove(&id)
                .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))?
        };
        session.status = SessionStatus::Abandoned;
        session.end_time = Some(Utc::now());
        session.warnings.push(format!("Session abandoned: {}", reason));
        self.finish(&session);

        warn!(session_id = %id, reason = %reason, "Session abandoned");
        self.bus.emit(EngineEvent::SessionCompleted {
            session_id: id.to_string(),
            status: session.status.to_string(),
            context_restored: false,
        });
        Ok(session)
    }

    /// Restore a snapshot into the live store.
    ///
    /// Unknown ids fail immediately; anything that goes wrong afterwards is reported in
    /// the result. The recovery pass lock is held for the whole restore.
    pub async fn restore(
        &self,
        snapshot_id: Uuid,
        insights: &[String],
    ) -> Result<RestoreResult, EngineError> {
        let snapshot = self.snapshots.get(snapshot_id)?;
        let pass = self.recovery.begin_exclusive().await;
        let start_time = Utc::now();
        let mut steps = Vec::new();
        let mut progress = RestoreProgress::default();

        let outcome = AssertUnwindSafe(self.restore_steps(
            &snapshot,
            insights,
            &pass,
            &mut steps,
            &mut progress,
        ))
        .catch_unwind()
        .await;
        drop(pass);

        let error = match outcome {
            Ok(()) => None,
            Err(payload) => {
                let message = panic_message(payload);
                steps.push(format!("Recovery failed: {}", message));
                Some(message)
            }
        };
        let (integrity, integrity_warning) =
            progress.integrity.unwrap_or((Integrity::Compromised, None));

        let result = RestoreResult {
            snapshot_id,
            start_time,
            end_time: Utc::now(),
            steps_executed: steps,
            notes: progress.notes,
            success: error.is_none(),
            error,
            restored_coherence: self.store.coherence(),
            integrity,
            integrity_warning,
            recovery: progress.recovery,
        };

        if result.success {
            info!(
                snapshot_id = %snapshot_id,
                steps = result.steps_executed.len(),
                coherence = result.restored_coherence,
                "Context restored from snapshot"
            );
            self.bus.emit(EngineEvent::ContextRecovered {
                snapshot_id: snapshot_id.to_string(),
                steps: result.steps_executed.clone(),
                restored_coherence: result.restored_coherence,
            });
        } else {
            warn!(
                snapshot_id = %snapshot_id,
                error = result.error.as_deref().unwrap_or_default(),
                "Context restore failed"
            );
        }
        Ok(result)
    }

    async fn restore_steps(
        &self,
        snapshot: &Snapshot,
        insights: &[String],
        pass: &RecoveryPass<'_>,
        steps: &mut Vec<String>,
        progress: &mut RestoreProgress,
    ) {
        self.store
            .update(RESTORING_FROM_SNAPSHOT_KEY, snapshot.id.to_string());
        steps.push("Initiated context restoration".to_string());

        self.store.merge(snapshot.context_copy.clone());
        steps.push("Pre-debug state restored".to_string());

        if !insights.is_empty() {
            let now = Utc::now().to_rfc3339();
            self.store.update(DEBUG_INSIGHTS_KEY, json!(insights));
            self.store.update(
                DEBUG_LEARNINGS_KEY,
                json!({
                    "snapshot_id": snapshot.id.to_string(),
                    "insights": insights,
                    "learned_at": now,
                }),
            );
            self.store.update(ENHANCED_BY_DEBUG_KEY, true);
            self.store.update(DEBUG_ENHANCEMENT_TIMESTAMP_KEY, now);
            steps.push(format!("Integrated {} debug insights", insights.len()));
        }

        let recovery = pass.run(Some(snapshot.id)).await;
        if recovery.success {
            steps.push("Component synchronization restored".to_string());
        } else {
            progress.notes.push(format!(
                "Component synchronization incomplete: {}",
                recovery.error.as_deref().unwrap_or("unknown error")
            ));
        }
        progress.notes.extend(recovery.notes.iter().cloned());
        progress.recovery = Some(recovery);

        let live = self.store.coherence();
        let drift = (live - snapshot.coherence).abs();
        if drift < self.config.restore_tolerance {
            steps.push("Context integrity: Valid".to_string());
            progress.integrity = Some((Integrity::Valid, None));
        } else {
            let warning = IntegrityWarning {
                snapshot_id: snapshot.id.to_string(),
                snapshot_coherence: snapshot.coherence,
                live_coherence: live,
                drift,
                tolerance: self.config.restore_tolerance,
            };
            warn!(snapshot_id = %snapshot.id, %warning, "Restored context drifted from snapshot");
            steps.push("Context integrity: Compromised".to_string());
            progress.integrity = Some((Integrity::Compromised, Some(warning)));
        }

        self.store.update(
            crate::snapshot::DEVELOPMENT_PHASE_KEY,
            snapshot.development_phase.clone(),
        );
        self.store.update(CONTEXT_RESTORED_KEY, true);
        self.store
            .update(RESTORATION_TIMESTAMP_KEY, Utc::now().to_rfc3339());
        steps.push("Development flow resumed".to_string());
    }

    /// Look up a session, active or finished.
    pub fn get(&self, id: Uuid) -> Result<Session, EngineError> {
        if let Some(session) = self.active.read().get(&id) {
            return Ok(session.clone());
        }
        self.completed
            .read()
            .iter()
            .rev()
            .find(|session| session.id == id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    /// Open sessions, oldest first.
    pub fn active(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.active.read().values().cloned().collect();
        sessions.sort_by_key(|session| session.start_time);
        sessions
    }

    /// Finished sessions, oldest first.
    pub fn completed(&self) -> Vec<Session> {
        self.completed.read().iter().cloned().collect()
    }

    /// One monitor pass over open sessions. Returns how many were checked.
    ///
    /// Warnings are appended on every pass the condition holds.
    pub fn monitor_sessions(&self) -> usize {
        let health = self.health.check_health(None);
        let now = Utc::now();
        let threshold = self.config.long_session_threshold();

        let mut active = self.active.write();
        for session in active.values_mut() {
            if session.status != SessionStatus::Active {
                continue;
            }
            let elapsed = session.elapsed();
            if elapsed > threshold && session.kind != SessionKind::Extended {
                let warning = format!(
                    "Session duration {:.1} hours - consider upgrading to Extended session type",
                    elapsed.as_secs_f64() / 3600.0
                );
                warn!(session_id = %session.id, %warning, "Long-running session");
                session.warnings.push(warning);
            }

            session.context_health = health.score;
            session.last_health_check = Some(now);
            if !health.is_healthy() {
                session.warnings.push(format!(
                    "Context health degraded during debugging: {:.2}",
                    health.score
                ));
            }
        }
        active.len()
    }

    fn finish(&self, session: &Session) {
        let is_current = self
            .store
            .get(ACTIVE_DEBUG_SESSION_KEY)
            .and_then(|value| value.as_str().map(|current| current == session.id.to_string()))
            .unwrap_or(false);
        if is_current {
            self.store.update(ACTIVE_DEBUG_SESSION_KEY, Value::Null);
        }
        self.store.update(DEBUG_MODE_KEY, false);
        match serde_json::to_value(session) {
            Ok(value) => self.store.update(LAST_DEBUG_SESSION_KEY, value),
            Err(e) => warn!(session_id = %session.id, error = %e, "Failed to serialize session"),
        }

        let mut completed = self.completed.write();
        completed.push_back(session.clone());
        while completed.len() > self.config.completed_history_limit.max(1) {
            completed.pop_front();
        }
    }
}

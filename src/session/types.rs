//! Session records and completion results.

use crate::error::{EngineError, IntegrityWarning};
use crate::recovery::RecoveryResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Expected length of a session; `Extended` sessions are never flagged as long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Quick,
    Standard,
    Extended,
    Emergency,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Quick => "quick",
            SessionKind::Standard => "standard",
            SessionKind::Extended => "extended",
            SessionKind::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(SessionKind::Quick),
            "standard" => Ok(SessionKind::Standard),
            "extended" => Ok(SessionKind::Extended),
            "emergency" => Ok(SessionKind::Emergency),
            other => Err(EngineError::ConfigError(format!(
                "Unknown session kind: {} (expected quick, standard, extended or emergency)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completing,
    Completed,
    Failed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Abandoned
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completing => "completing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub target: String,
    pub description: Option<String>,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub snapshot_id: Option<Uuid>,
    pub findings: Vec<String>,
    pub warnings: Vec<String>,
    pub context_health: f64,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl Session {
    /// Wall-clock time from start to end (or to now while open).
    pub fn elapsed(&self) -> Duration {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).to_std().unwrap_or_default()
    }
}

/// Outcome of the snapshot integrity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    Valid,
    Compromised,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub snapshot_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps_executed: Vec<String>,
    pub notes: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
    pub restored_coherence: f64,
    pub integrity: Integrity,
    pub integrity_warning: Option<IntegrityWarning>,
    /// The recovery pass run as part of the restore, if it got that far
    pub recovery: Option<RecoveryResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub session: Session,
    pub completion_time: DateTime<Utc>,
    pub duration: Duration,
    pub findings: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
    pub context_restored: bool,
    pub recovery_steps: Vec<String>,
    pub recovery_error: Option<String>,
    pub integrity_warning: Option<IntegrityWarning>,
}

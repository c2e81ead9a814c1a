//! Error types for the context synchronization engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Snapshot archive errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidData(err.to_string())
    }
}

/// Errors raised by external state sources
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator returned invalid state: {0}")]
    InvalidState(String),
}

/// Engine-facing errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Timed out after {0:?} waiting for response")]
    Timeout(Duration),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("Recovery error: {0}")]
    RecoveryError(String),

    #[error("Request scheduler is stopped")]
    SchedulerStopped,

    #[error("Request queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl EngineError {
    /// True for the unknown-id family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::SessionNotFound(_) | EngineError::SnapshotNotFound(_)
        )
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}

/// Coherence drift observed while restoring a snapshot.
///
/// Reported alongside a successful restore; never returned as an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub snapshot_id: String,
    pub snapshot_coherence: f64,
    pub live_coherence: f64,
    pub drift: f64,
    pub tolerance: f64,
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "coherence drift {:.3} exceeds tolerance {:.2} (snapshot {:.3}, live {:.3})",
            self.drift, self.tolerance, self.snapshot_coherence, self.live_coherence
        )
    }
}

/// Render a caught panic payload as a message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

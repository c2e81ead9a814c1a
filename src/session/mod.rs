//! Session Manager
//!
//! Debug-style sessions: a snapshot is captured when a session opens, and closing it
//! can restore that snapshot, fold the session's findings into the context and run a
//! recovery pass. A periodic monitor flags long-running sessions and degraded health.

pub mod manager;
pub mod types;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use manager::SessionManager;
pub use types::{
    Integrity, RestoreResult, Session, SessionKind, SessionResult, SessionStatus,
};

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions older than this (seconds) get a warning unless they are `Extended`
    pub long_session_threshold_secs: u64,
    /// Period of the background session monitor (milliseconds)
    pub monitor_interval_ms: u64,
    /// Maximum coherence drift for a restore to count as valid
    pub restore_tolerance: f64,
    /// Finished sessions kept for inspection
    pub completed_history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            long_session_threshold_secs: 2 * 60 * 60,
            monitor_interval_ms: 10_000,
            restore_tolerance: 0.2,
            completed_history_limit: 100,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.monitor_interval_ms == 0 {
            return Err("Sessions monitor_interval_ms must be greater than 0".to_string());
        }
        if !(self.restore_tolerance > 0.0 && self.restore_tolerance <= 1.0) {
            return Err(format!(
                "Sessions restore_tolerance must be within (0, 1], got {}",
                self.restore_tolerance
            ));
        }
        Ok(())
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn long_session_threshold(&self) -> Duration {
        Duration::from_secs(self.long_session_threshold_secs)
    }
}

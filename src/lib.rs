//! ctxsync: Context Synchronization & Recovery Engine
//!
//! A shared context store, a single-worker request pipeline, periodic health checks
//! and a session-scoped snapshot/restore subsystem with tolerance-based verification.

pub mod cli;
pub mod collaborator;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod health;
pub mod logging;
pub mod recovery;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod telemetry;
pub mod ticker;

pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;

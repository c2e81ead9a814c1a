//! Property-based tests for engine invariants

pub mod coherence;
pub mod health;
pub mod snapshots;
pub mod streaming;

//! Integration tests module
//!
//! Organizes integration tests by the component they drive end to end.

pub mod config_layering;
pub mod engine_scenarios;
pub mod session_lifecycle;
pub mod snapshot_archive;
pub mod test_utils;

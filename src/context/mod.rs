//! Context domain: the shared store and its detached copies.

pub mod store;
pub mod types;

pub use store::ContextStore;
pub use types::{compute_coherence, ComponentState, ComponentStatus, ContextSnapshot};

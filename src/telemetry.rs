//! Telemetry domain: event schema and the in-process bus.

pub mod bus;
pub mod events;

pub use bus::EventBus;
pub use events::{EngineEvent, EventEnvelope};

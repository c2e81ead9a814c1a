//! In-process event bus for engine notifications.

use tokio::sync::broadcast;
use tracing::trace;

use crate::telemetry::events::{EngineEvent, EventEnvelope};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Publish synchronously. Having no subscribers is not an error.
    pub fn emit(&self, event: EngineEvent) {
        let kind = event.kind();
        let delivered = self.sender.send(EventEnvelope::with_now(event)).unwrap_or(0);
        trace!(event = kind, subscribers = delivered, "event emitted");
    }
}

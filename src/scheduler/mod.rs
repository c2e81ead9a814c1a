//! Request Scheduler
//!
//! FIFO queue drained by a single background worker. Each request is handed to the
//! configured [`RequestProcessor`] together with a fresh copy of the context store,
//! and the result is delivered to whoever is still waiting for it. Exactly one request
//! is in flight at any time; `priority` is carried on the request but never reorders it.

pub mod conversation;
pub mod processor;
pub mod types;

use crate::context::ContextStore;
use crate::error::{panic_message, EngineError};
use crate::telemetry::{EngineEvent, EventBus};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use conversation::{ConversationLog, Exchange};
pub use processor::{ContextAwareProcessor, RequestProcessor};
pub use types::{
    stream_chunks, ProcessorOutput, Request, Response, StreamChunk, DEFAULT_CONVERSATION,
    NORMAL_PRIORITY, URGENT_PRIORITY,
};

/// Store key holding the last successful response (serialized).
pub const LAST_RESPONSE_KEY: &str = "last_response";
/// Store key holding the coherence observed by the last successful request.
pub const SYSTEM_COHERENCE_KEY: &str = "system_coherence";

/// Configuration for the request scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of queued (not yet dequeued) requests
    pub max_queue_size: usize,
    /// Wait applied by `submit` when the caller passes no timeout (milliseconds)
    pub default_timeout_ms: u64,
    /// How often an idle worker re-checks its running flag (milliseconds)
    pub idle_poll_ms: u64,
    /// Exchanges kept per conversation
    pub conversation_history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1_000,
            default_timeout_ms: 30_000,
            idle_poll_ms: 100,
            conversation_history_limit: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("Scheduler max_queue_size must be greater than 0".to_string());
        }
        if self.default_timeout_ms == 0 {
            return Err("Scheduler default_timeout_ms must be greater than 0".to_string());
        }
        if self.idle_poll_ms == 0 {
            return Err("Scheduler idle_poll_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Lifecycle of the scheduler. `Idle` accepts and holds requests until started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Requests waiting in the queue
    pub pending: usize,
    /// Requests currently being processed (0 or 1)
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    /// Responses produced after their caller stopped waiting
    pub discarded: usize,
}

struct QueuedRequest {
    request: Request,
    completion_tx: oneshot::Sender<Response>,
}

/// Handle to a queued request's eventual response.
#[derive(Debug)]
pub struct PendingResponse {
    request_id: Uuid,
    receiver: oneshot::Receiver<Response>,
}

impl PendingResponse {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Wait up to `timeout`. Giving up does not cancel the request; it still runs and
    /// its response is discarded.
    pub async fn wait(self, timeout: Duration) -> Result<Response, EngineError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(EngineError::SchedulerStopped),
            Err(_) => Err(EngineError::Timeout(timeout)),
        }
    }
}

struct Shared {
    queue: Mutex<VecDeque<QueuedRequest>>,
    notify: Notify,
    state: RwLock<SchedulerState>,
    stats: RwLock<SchedulerStats>,
    store: Arc<ContextStore>,
    processor: Arc<dyn RequestProcessor>,
    bus: EventBus,
    conversations: ConversationLog,
    config: SchedulerConfig,
}

pub struct RequestScheduler {
    shared: Arc<Shared>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RequestScheduler {
    pub fn new(
        store: Arc<ContextStore>,
        processor: Arc<dyn RequestProcessor>,
        bus: EventBus,
        config: SchedulerConfig,
    ) -> Self {
        let conversations = ConversationLog::new(config.conversation_history_limit);
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                state: RwLock::new(SchedulerState::Idle),
                stats: RwLock::new(SchedulerStats::default()),
                store,
                processor,
                bus,
                conversations,
                config,
            }),
            worker: parking_lot::Mutex::new(None),
        }
    }

    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), EngineError> {
        {
            let mut state = self.shared.state.write();
            match *state {
                SchedulerState::Running => return Ok(()),
                SchedulerState::Stopped => return Err(EngineError::SchedulerStopped),
                SchedulerState::Idle => *state = SchedulerState::Running,
            }
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move { worker_loop(shared).await });
        *self.worker.lock() = Some(handle);

        info!("Started request scheduler worker");
        Ok(())
    }

    /// Finish the in-flight request, then reject everything still queued.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.state.write();
            if *state == SchedulerState::Stopped {
                return;
            }
            *state = SchedulerState::Stopped;
        }
        self.shared.notify.notify_one();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Request scheduler worker ended abnormally");
            }
        }

        // Dropping the senders resolves every waiter with `SchedulerStopped`.
        let rejected: Vec<QueuedRequest> = self.shared.queue.lock().await.drain(..).collect();
        {
            let mut stats = self.shared.stats.write();
            stats.pending = stats.pending.saturating_sub(rejected.len());
        }
        info!(rejected = rejected.len(), "Stopped request scheduler");
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.read()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats.read().clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Exchanges recorded for `conversation_id`, oldest first.
    pub fn conversation(&self, conversation_id: &str) -> Vec<Exchange> {
        self.shared.conversations.history(conversation_id)
    }

    pub fn conversations(&self) -> &ConversationLog {
        &self.shared.conversations
    }

    /// Queue a request and return a handle to its response.
    pub async fn enqueue(
        &self,
        payload: impl Into<String>,
        conversation_id: Option<String>,
        priority: u8,
    ) -> Result<PendingResponse, EngineError> {
        let request = Request::new(payload, conversation_id, priority);
        let (completion_tx, receiver) = oneshot::channel();

        let mut queue = self.shared.queue.lock().await;
        if self.state() == SchedulerState::Stopped {
            return Err(EngineError::SchedulerStopped);
        }
        if queue.len() >= self.shared.config.max_queue_size {
            warn!(
                queue_size = queue.len(),
                max_size = self.shared.config.max_queue_size,
                "Request queue is full, rejecting request"
            );
            return Err(EngineError::QueueFull(queue.len()));
        }

        let request_id = request.id;
        let conversation_id = request.conversation_id.clone();
        queue.push_back(QueuedRequest {
            request,
            completion_tx,
        });
        let queue_size = queue.len();
        self.shared.stats.write().pending += 1;
        self.shared.notify.notify_one();
        drop(queue);

        debug!(
            request_id = %request_id,
            conversation_id = %conversation_id,
            priority,
            queue_size,
            "Enqueued request"
        );
        self.shared.bus.emit(EngineEvent::RequestEnqueued {
            request_id: request_id.to_string(),
            conversation_id,
            priority,
        });

        Ok(PendingResponse {
            request_id,
            receiver,
        })
    }

    /// Queue a request and wait for its response.
    ///
    /// `None` waits for the configured default timeout.
    pub async fn submit(
        &self,
        payload: impl Into<String>,
        conversation_id: Option<String>,
        priority: u8,
        timeout: Option<Duration>,
    ) -> Result<Response, EngineError> {
        let timeout = timeout.unwrap_or_else(|| self.shared.config.default_timeout());
        let pending = self.enqueue(payload, conversation_id, priority).await?;
        let request_id = pending.request_id();
        let result = pending.wait(timeout).await;
        if let Err(EngineError::Timeout(_)) = &result {
            warn!(request_id = %request_id, timeout_ms = timeout.as_millis() as u64, "Request timed out");
        }
        result
    }

    /// Wait until nothing is queued or in flight.
    pub async fn wait_idle(&self, timeout: Duration) -> Result<(), EngineError> {
        let start = Instant::now();
        loop {
            let queue_empty = self.shared.queue.lock().await.is_empty();
            if queue_empty && self.shared.stats.read().processing == 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(EngineError::Timeout(timeout));
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    debug!("Request worker started");
    let idle_poll = Duration::from_millis(shared.config.idle_poll_ms);

    while *shared.state.read() == SchedulerState::Running {
        let next = {
            let mut queue = shared.queue.lock().await;
            let next = queue.pop_front();
            if next.is_some() {
                let mut stats = shared.stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.processing += 1;
            }
            next
        };
        let Some(queued) = next else {
            tokio::select! {
                _ = shared.notify.notified() => continue,
                _ = sleep(idle_poll) => continue,
            }
        };
        process_one(&shared, queued).await;
    }

    debug!("Request worker exited");
}

async fn process_one(shared: &Shared, queued: QueuedRequest) {
    let QueuedRequest {
        request,
        completion_tx,
    } = queued;
    let request_id = request.id.to_string();

    shared.bus.emit(EngineEvent::RequestDequeued {
        request_id: request_id.clone(),
    });
    shared.bus.emit(EngineEvent::RequestProcessing {
        request_id: request_id.clone(),
    });

    let context = shared.store.snapshot();
    let started = Instant::now();
    let outcome = AssertUnwindSafe(async { shared.processor.process(&request, &context).await })
        .catch_unwind()
        .await;
    let elapsed = started.elapsed();

    let (content, success, confidence) = match outcome {
        Ok(Ok(output)) => (output.content, true, output.confidence),
        Ok(Err(err)) => {
            let message = match err {
                EngineError::ProcessingError(message) => message,
                other => other.to_string(),
            };
            warn!(request_id = %request_id, error = %message, "Request processing failed");
            (format!("Processing error: {}", message), false, 0.0)
        }
        Err(payload) => {
            let message = panic_message(payload);
            warn!(request_id = %request_id, panic = %message, "Request processor panicked");
            (format!("Processing error: {}", message), false, 0.0)
        }
    };

    let response = Response {
        id: request.id,
        conversation_id: request.conversation_id.clone(),
        content,
        success,
        confidence,
        timestamp: Utc::now(),
        processing_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    };

    if response.success {
        match serde_json::to_value(&response) {
            Ok(value) => shared.store.update(LAST_RESPONSE_KEY, value),
            Err(e) => warn!(request_id = %request_id, error = %e, "Failed to serialize response"),
        }
        shared.store.update(SYSTEM_COHERENCE_KEY, context.coherence);
    }
    shared.conversations.record(&request, &response);

    let success = response.success;
    let duration_ms = response.processing_time_ms;
    let discarded = completion_tx.send(response).is_err();
    {
        let mut stats = shared.stats.write();
        stats.processing = stats.processing.saturating_sub(1);
        if success {
            stats.completed += 1;
        } else {
            stats.failed += 1;
        }
        if discarded {
            stats.discarded += 1;
        }
    }
    debug!(
        request_id = %request_id,
        success,
        duration_ms,
        "Request completed"
    );
    shared.bus.emit(EngineEvent::RequestCompleted {
        request_id: request_id.clone(),
        success,
        duration_ms: elapsed.as_millis(),
    });

    if discarded {
        debug!(request_id = %request_id, "Caller stopped waiting, response discarded");
        shared.bus.emit(EngineEvent::ResponseDiscarded { request_id });
    }
}

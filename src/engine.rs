//! Engine
//!
//! Composition root: owns the store, the event bus and every component, wires them
//! together from an [`EngineConfig`] and runs the background tasks between `start`
//! and `shutdown`.

use crate::collaborator::{HttpSyncBridge, NullBridge, StateSource, SyncBridge};
use crate::config::EngineConfig;
use crate::context::ContextStore;
use crate::error::EngineError;
use crate::health::{HealthMonitor, HealthResult};
use crate::recovery::{RecoveryEngine, RecoveryResult};
use crate::scheduler::{
    stream_chunks, ContextAwareProcessor, RequestProcessor, RequestScheduler, Response,
    StreamChunk, NORMAL_PRIORITY, URGENT_PRIORITY,
};
use crate::session::{RestoreResult, Session, SessionKind, SessionManager, SessionResult};
use crate::snapshot::{Snapshot, SnapshotArchive, SnapshotManager};
use crate::telemetry::{EventBus, EventEnvelope};
use crate::ticker::Ticker;
use futures::Stream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    processor: Option<Arc<dyn RequestProcessor>>,
    bridge: Option<Arc<dyn SyncBridge>>,
    sources: Vec<Arc<dyn StateSource>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            processor: None,
            bridge: None,
            sources: Vec::new(),
        }
    }

    /// Processor for scheduled requests; defaults to [`ContextAwareProcessor`].
    pub fn processor(mut self, processor: Arc<dyn RequestProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Bridge override; by default one is derived from `[bridge]` config.
    pub fn bridge(mut self, bridge: Arc<dyn SyncBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn state_source(mut self, source: Arc<dyn StateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config;
        config.ensure_valid()?;

        let store = Arc::new(ContextStore::with_components(
            config
                .components
                .iter()
                .map(|(name, status)| (name.clone(), *status)),
        ));
        let bus = EventBus::default();

        let bridge: Arc<dyn SyncBridge> = match (self.bridge, &config.bridge.endpoint) {
            (Some(bridge), _) => bridge,
            (None, Some(endpoint)) => Arc::new(HttpSyncBridge::new(endpoint.clone(), &config.bridge)?),
            (None, None) => Arc::new(NullBridge),
        };

        let mut snapshots = SnapshotManager::new(Arc::clone(&store), bus.clone());
        if let Some(path) = &config.storage.snapshot_path {
            snapshots = snapshots.with_archive(SnapshotArchive::open(path)?);
        }
        snapshots.restore_from_archive()?;
        let snapshots = Arc::new(snapshots);

        let recovery = Arc::new(
            RecoveryEngine::new(
                Arc::clone(&store),
                Arc::clone(&bridge),
                bus.clone(),
                config.recovery.clone(),
            )
            .with_sources(self.sources),
        );
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            Arc::clone(&recovery),
            Arc::clone(&bridge),
            bus.clone(),
            config.health.clone(),
        ));
        let processor = self
            .processor
            .unwrap_or_else(|| Arc::new(ContextAwareProcessor));
        let scheduler = RequestScheduler::new(
            Arc::clone(&store),
            processor,
            bus.clone(),
            config.scheduler.clone(),
        );
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&store),
            Arc::clone(&snapshots),
            Arc::clone(&recovery),
            Arc::clone(&health),
            bus.clone(),
            config.sessions.clone(),
        ));

        Ok(Engine {
            config,
            store,
            bus,
            snapshots,
            scheduler,
            recovery,
            health,
            sessions,
            tickers: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

pub struct Engine {
    config: EngineConfig,
    store: Arc<ContextStore>,
    bus: EventBus,
    snapshots: Arc<SnapshotManager>,
    scheduler: RequestScheduler,
    recovery: Arc<RecoveryEngine>,
    health: Arc<HealthMonitor>,
    sessions: Arc<SessionManager>,
    tickers: parking_lot::Mutex<Vec<Ticker>>,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Start the request worker and the health and session monitors.
    pub fn start(&self) -> Result<(), EngineError> {
        self.scheduler.start()?;

        let mut tickers = self.tickers.lock();
        if !tickers.is_empty() {
            return Ok(());
        }

        let health = Arc::clone(&self.health);
        tickers.push(Ticker::spawn(
            "health",
            self.config.health.check_interval(),
            move || {
                let health = Arc::clone(&health);
                async move {
                    health.tick().await;
                }
            },
        ));

        let sessions = Arc::clone(&self.sessions);
        tickers.push(Ticker::spawn(
            "sessions",
            self.config.sessions.monitor_interval(),
            move || {
                let sessions = Arc::clone(&sessions);
                async move {
                    sessions.monitor_sessions();
                }
            },
        ));

        info!(
            health_interval_ms = self.config.health.check_interval_ms,
            session_interval_ms = self.config.sessions.monitor_interval_ms,
            "Engine started"
        );
        Ok(())
    }

    /// Stop the monitors, then drain the scheduler.
    pub async fn shutdown(&self) {
        let tickers = std::mem::take(&mut *self.tickers.lock());
        for ticker in tickers {
            ticker.stop().await;
        }
        self.scheduler.stop().await;
        info!("Engine stopped");
    }

    /// Submit a request and wait for its response.
    ///
    /// The input is health-checked first; a context that needs immediate recovery is
    /// recovered before the request is queued, and the request is marked urgent. The
    /// timeout (default: the scheduler's) covers the recovery pass as well as the wait.
    /// A caller that times out during recovery leaves the pass running to completion.
    pub async fn submit(
        &self,
        payload: impl Into<String>,
        conversation_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Response, EngineError> {
        let timeout = timeout.unwrap_or_else(|| self.config.scheduler.default_timeout());
        let started = Instant::now();
        let payload = payload.into();
        self.health.record_input(payload.clone());

        let health = self.health.check_health(Some(&payload));
        let priority = if health.needs_immediate_recovery() {
            warn!(
                score = health.score,
                indicators = ?health.indicators,
                "Context needs immediate recovery before processing"
            );
            let recovery = Arc::clone(&self.recovery);
            let pass = tokio::spawn(async move { recovery.recover().await });
            match tokio::time::timeout(timeout, pass).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "Pre-submit recovery task failed"),
                Err(_) => {
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "Request timed out during pre-submit recovery"
                    );
                    return Err(EngineError::Timeout(timeout));
                }
            }
            URGENT_PRIORITY
        } else {
            NORMAL_PRIORITY
        };

        let remaining = timeout.saturating_sub(started.elapsed());
        self.scheduler
            .submit(payload, conversation_id, priority, Some(remaining))
            .await
            .map_err(|e| match e {
                EngineError::Timeout(_) => EngineError::Timeout(timeout),
                other => other,
            })
    }

    /// Submit a request and deliver its response as word chunks.
    pub async fn submit_streaming(
        &self,
        payload: impl Into<String>,
        conversation_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<impl Stream<Item = StreamChunk>, EngineError> {
        let response = self.submit(payload, conversation_id, timeout).await?;
        Ok(futures::stream::iter(stream_chunks(&response)))
    }

    pub fn check_health(&self, latest_input: Option<&str>) -> HealthResult {
        self.health.check_health(latest_input)
    }

    pub async fn recover(&self) -> RecoveryResult {
        self.recovery.recover().await
    }

    pub fn start_session(
        &self,
        target: impl Into<String>,
        description: Option<String>,
        kind: SessionKind,
    ) -> Session {
        self.sessions.start(target, description, kind)
    }

    pub async fn complete_session(
        &self,
        id: Uuid,
        findings: Vec<String>,
        restore_context: bool,
    ) -> Result<SessionResult, EngineError> {
        self.sessions.complete(id, findings, restore_context).await
    }

    pub fn abandon_session(&self, id: Uuid, reason: impl Into<String>) -> Result<Session, EngineError> {
        self.sessions.abandon(id, reason)
    }

    pub async fn restore_snapshot(
        &self,
        snapshot_id: Uuid,
        insights: &[String],
    ) -> Result<RestoreResult, EngineError> {
        self.sessions.restore(snapshot_id, insights).await
    }

    /// Capture the store as a snapshot outside of any session.
    pub fn create_snapshot(
        &self,
        trigger: impl Into<String>,
        description: Option<String>,
    ) -> Arc<Snapshot> {
        self.snapshots.capture(trigger, description)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    pub fn recovery(&self) -> &RecoveryEngine {
        &self.recovery
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

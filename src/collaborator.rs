//! External Collaborators
//!
//! Interfaces the engine consumes but does not implement: state sources that report
//! a component's current state, and a synchronization bridge that receives copies of
//! the context. A JSON-over-HTTP bridge is provided for editor-side listeners.

use crate::context::ContextSnapshot;
use crate::error::{CollaboratorError, EngineError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A named external subsystem whose state is pulled during recovery.
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Component name; also the key prefix the state is stored under.
    fn name(&self) -> &str;

    async fn get_state(&self) -> Result<Value, CollaboratorError>;
}

/// Receiver of context copies.
#[async_trait]
pub trait SyncBridge: Send + Sync {
    /// Push the context; `false` when the far side did not accept it.
    async fn push(&self, context: &ContextSnapshot) -> bool;
}

/// State source that always reports the same value.
#[derive(Debug, Clone)]
pub struct StaticStateSource {
    name: String,
    state: Value,
}

impl StaticStateSource {
    pub fn new(name: impl Into<String>, state: Value) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

#[async_trait]
impl StateSource for StaticStateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_state(&self) -> Result<Value, CollaboratorError> {
        Ok(self.state.clone())
    }
}

/// Bridge used when nothing is listening; accepts every push.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBridge;

#[async_trait]
impl SyncBridge for NullBridge {
    async fn push(&self, _context: &ContextSnapshot) -> bool {
        true
    }
}

#[derive(Serialize)]
struct SyncMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    context: &'a ContextSnapshot,
    timestamp: String,
    source: &'a str,
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener endpoint; `None` disables the HTTP bridge
    pub endpoint: Option<String>,
    pub request_timeout_ms: u64,
    /// Value of the `source` field in pushed messages
    pub source: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_ms: 2_000,
            source: "ctxsync".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!("Bridge endpoint must be an http(s) URL: {}", endpoint));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err("Bridge request timeout must be positive".to_string());
        }
        Ok(())
    }
}

/// Bridge that POSTs `{type, context, timestamp, source}` as JSON.
pub struct HttpSyncBridge {
    client: Client,
    endpoint: String,
    source: String,
}

impl HttpSyncBridge {
    pub fn new(endpoint: impl Into<String>, config: &BridgeConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| EngineError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            source: config.source.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SyncBridge for HttpSyncBridge {
    async fn push(&self, context: &ContextSnapshot) -> bool {
        let message = SyncMessage {
            message_type: "context_sync",
            context,
            timestamp: Utc::now().to_rfc3339(),
            source: &self.source,
        };
        match self.client.post(&self.endpoint).json(&message).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                // A listener that is not running is the common case.
                debug!(endpoint = %self.endpoint, error = %e, "bridge push failed");
                false
            }
        }
    }
}

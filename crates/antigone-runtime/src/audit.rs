//! Best-effort audit emission.
//!
//! Decision and refusal events are forwarded to an external relay on a
//! detached task. Each event gets exactly one delivery attempt bounded by
//! the configured timeout; failures are logged at debug level and dropped.
//! Nothing is retried, queued, or reported back to the request that
//! produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use antigone_core::Decision;

use crate::config::{AuditConfig, DecisionMode};
use crate::RuntimeError;

/// Errors from a single delivery attempt. Never leave the emitter.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Relay responded with status {0}")]
    Status(u16),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Kind of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    #[serde(rename = "policy.decision")]
    Decision,

    #[serde(rename = "policy.refusal")]
    Refusal,
}

/// Event posted to the relay. Consumers must tolerate extra fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub event_type: AuditEventType,

    pub timestamp: DateTime<Utc>,

    pub result: Decision,

    pub mode: DecisionMode,

    /// Command text, carried on refusals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
}

impl AuditEvent {
    /// A `policy.decision` event for a dry-run check.
    pub fn decision(result: Decision, mode: DecisionMode) -> Self {
        Self {
            event_type: AuditEventType::Decision,
            timestamp: Utc::now(),
            result,
            mode,
            cmd: None,
        }
    }

    /// A `policy.refusal` event for a blocked action.
    pub fn refusal(result: Decision, mode: DecisionMode, cmd: impl Into<String>) -> Self {
        Self {
            event_type: AuditEventType::Refusal,
            timestamp: Utc::now(),
            result,
            mode,
            cmd: Some(cmd.into()),
        }
    }
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Make one delivery attempt.
    async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Sink that POSTs events as JSON to `<relay_base>/event`.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl fmt::Debug for HttpAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuditSink")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl HttpAuditSink {
    pub fn new(relay_base: &str, timeout: Duration) -> Result<Self, AuditError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/event", relay_base.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| AuditError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AuditError::Status(status.as_u16()))
        }
    }
}

/// Outcome of a detached delivery, observable through the join handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped,
}

/// Fire-and-forget forwarder of audit events.
#[derive(Clone)]
pub struct AuditEmitter {
    sink: Option<Arc<dyn AuditSink>>,
    timeout: Duration,
}

impl fmt::Debug for AuditEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditEmitter")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AuditEmitter {
    /// Emitter with a custom sink.
    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self {
            sink: Some(sink),
            timeout,
        }
    }

    /// Emitter that drops everything without trying.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            timeout: Duration::ZERO,
        }
    }

    /// HTTP emitter for the configured relay, or a disabled one.
    pub fn from_config(config: &AuditConfig) -> Result<Self, RuntimeError> {
        match &config.relay_base {
            Some(base) => {
                let sink = HttpAuditSink::new(base, config.timeout)
                    .map_err(|e| RuntimeError::Config(e.to_string()))?;
                tracing::info!(endpoint = sink.endpoint(), "Audit relay enabled");
                Ok(Self::new(Arc::new(sink), config.timeout))
            }
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Start a detached delivery of `event`.
    ///
    /// Returns immediately. The handle resolves to the delivery outcome and
    /// may be ignored. Returns `None` when no sink is configured or when
    /// called outside a tokio runtime.
    pub fn emit(&self, event: AuditEvent) -> Option<JoinHandle<Delivery>> {
        let sink = self.sink.clone()?;
        let timeout = self.timeout;

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("No async runtime, audit event dropped");
                return None;
            }
        };

        Some(handle.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, sink.deliver(&event)).await {
                Ok(result) => result,
                Err(_) => Err(AuditError::Timeout(timeout)),
            };

            match outcome {
                Ok(()) => Delivery::Delivered,
                Err(e) => {
                    tracing::debug!(error = %e, event = ?event.event_type, "Audit event dropped");
                    Delivery::Dropped
                }
            }
        }))
    }
}

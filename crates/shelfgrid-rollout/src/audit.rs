//! Audit sink — one structured record per stage transition.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shelfgrid_types::Stage;

/// Emitted once per stage transition. The orchestrator itself exposes
/// no storage; callers needing alerting subscribe through a sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub run_id: String,
    pub stage: Stage,
    pub success: bool,
    pub duration_ms: u64,
    pub detail: Option<String>,
}

/// Receives audit events. Sink failures must not affect the run; the
/// orchestrator logs and continues.
pub trait AuditSink {
    fn record(&self, event: &AuditEvent) -> impl std::future::Future<Output = ()> + Send;
}

/// Sink that emits each event as a structured log record.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) {
        info!(
            run_id = %event.run_id,
            stage = %event.stage,
            success = event.success,
            duration_ms = event.duration_ms,
            detail = event.detail.as_deref().unwrap_or(""),
            "stage transition"
        );
    }
}

/// Sink that POSTs each event as JSON to an external collector (such
/// as an alerting webhook). Delivery failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct WebhookAuditSink {
    url: String,
    timeout: Duration,
}

impl WebhookAuditSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl AuditSink for WebhookAuditSink {
    async fn record(&self, event: &AuditEvent) {
        let body = match serde_json::to_vec(event) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "audit event failed to serialize");
                return;
            }
        };

        match shelfgrid_health::client::post_json(&self.url, body, self.timeout).await {
            Ok(status) if (200..300).contains(&status) => {}
            Ok(status) => {
                warn!(url = %self.url, status, "audit webhook non-2xx");
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "audit webhook delivery failed");
            }
        }
    }
}

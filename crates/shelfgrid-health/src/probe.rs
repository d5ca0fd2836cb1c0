//! Health probe — liveness plus thresholded metrics signals.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use shelfgrid_types::{epoch_millis, HealthSample};

use crate::client;
use crate::metrics::MetricsSource;

/// Produces one [`HealthSample`] per check. Infallible by contract:
/// transport failures are encoded as unhealthy samples, never errors,
/// so the monitoring loop treats them as soft failures.
pub trait HealthProbe {
    fn check(
        &self,
        target: &str,
    ) -> impl std::future::Future<Output = HealthSample> + Send;
}

/// Thresholds and timing for the HTTP probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-call timeout for the liveness GET.
    pub timeout: Duration,
    /// Maximum tolerated error rate, in [0, 1].
    pub max_error_rate: f64,
    /// Maximum tolerated p95 latency in seconds.
    pub max_p95_latency_secs: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_error_rate: 0.05,
            max_p95_latency_secs: 2.0,
        }
    }
}

/// Placeholder metrics source for probes that only do liveness checks.
pub enum NoMetrics {}

impl MetricsSource for NoMetrics {
    async fn query(&self, _name: &str) -> Result<f64, shelfgrid_types::CollaboratorError> {
        match *self {}
    }
}

/// HTTP health probe: `GET {base}/health` against the endpoint mapped
/// to the target, expecting a 2xx response, plus optional error-rate
/// and p95-latency gating through a [`MetricsSource`].
///
/// A failed metrics query defaults that one signal to passing
/// (fail-open) so an unreachable metrics backend cannot flip a window
/// unhealthy by itself.
pub struct HttpHealthProbe<M = NoMetrics> {
    /// Environment name → base URL.
    endpoints: HashMap<String, String>,
    config: ProbeConfig,
    metrics: Option<M>,
}

impl HttpHealthProbe<NoMetrics> {
    /// Liveness-only probe.
    pub fn new(endpoints: HashMap<String, String>, config: ProbeConfig) -> Self {
        Self {
            endpoints,
            config,
            metrics: None,
        }
    }
}

impl<M: MetricsSource> HttpHealthProbe<M> {
    /// Probe that also gates on error rate and p95 latency.
    pub fn with_metrics(
        endpoints: HashMap<String, String>,
        config: ProbeConfig,
        metrics: M,
    ) -> Self {
        Self::with_optional_metrics(endpoints, config, Some(metrics))
    }

    /// Probe whose metrics gating depends on whether a source is
    /// available at assembly time.
    pub fn with_optional_metrics(
        endpoints: HashMap<String, String>,
        config: ProbeConfig,
        metrics: Option<M>,
    ) -> Self {
        Self {
            endpoints,
            config,
            metrics,
        }
    }

    async fn liveness(&self, base: &str) -> bool {
        let url = format!("{}/health", base.trim_end_matches('/'));
        match client::get(&url, self.config.timeout).await {
            Ok((status, _)) if (200..300).contains(&status) => true,
            Ok((status, _)) => {
                debug!(%url, status, "liveness non-2xx");
                false
            }
            Err(e) => {
                debug!(%url, error = %e, "liveness check failed");
                false
            }
        }
    }

    /// Query one metric; a failed query passes with a default of 0.0.
    async fn gated_metric(&self, name: &str, threshold: f64) -> (f64, bool) {
        let Some(metrics) = &self.metrics else {
            return (0.0, true);
        };
        match metrics.query(name).await {
            Ok(value) => (value, value <= threshold),
            Err(e) => {
                warn!(metric = name, error = %e, "metrics query failed, defaulting to pass");
                (0.0, true)
            }
        }
    }
}

impl<M: MetricsSource + Sync> HealthProbe for HttpHealthProbe<M> {
    async fn check(&self, target: &str) -> HealthSample {
        let Some(base) = self.endpoints.get(target) else {
            warn!(%target, "no endpoint configured for target");
            return HealthSample::unhealthy_now();
        };

        let live = self.liveness(base).await;
        let (error_rate, error_ok) =
            self.gated_metric("error_rate", self.config.max_error_rate).await;
        let (p95, p95_ok) = self
            .gated_metric("p95_latency", self.config.max_p95_latency_secs)
            .await;

        HealthSample {
            timestamp_ms: epoch_millis(),
            healthy: live && error_ok && p95_ok,
            error_rate,
            p95_latency_secs: p95,
        }
    }
}

//! Metrics query source — one scalar per named query.

use std::time::Duration;

use tracing::debug;

use shelfgrid_types::CollaboratorError;

use crate::client;

/// Returns a single scalar for a named query (`error_rate`,
/// `p95_latency`). Implementations decide the query language.
pub trait MetricsSource {
    fn query(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<f64, CollaboratorError>> + Send;
}

/// Queries an HTTP metrics endpoint: `GET {base}/query?name={query}`,
/// expecting a JSON body of the form `{"value": 0.03}`.
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    base_url: String,
    timeout: Duration,
}

impl HttpMetricsSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl MetricsSource for HttpMetricsSource {
    async fn query(&self, name: &str) -> Result<f64, CollaboratorError> {
        let url = format!("{}/query?name={name}", self.base_url);
        let (status, body) = client::get(&url, self.timeout).await?;

        if !(200..300).contains(&status) {
            debug!(%url, status, "metrics query non-2xx");
            return Err(CollaboratorError::unavailable(format!(
                "metrics query {name} returned {status}"
            )));
        }

        parse_metric_body(&body).ok_or_else(|| {
            CollaboratorError::unavailable(format!("metrics query {name}: malformed body"))
        })
    }
}

/// Extract the scalar from a `{"value": <number>}` body.
fn parse_metric_body(body: &[u8]) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("value")?.as_f64()
}

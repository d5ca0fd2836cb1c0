//! shelfgrid.toml loading.
//!
//! A missing file falls back to defaults; a malformed one is a
//! configuration error and nothing runs.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use shelfgrid_rollout::RolloutConfig;
use shelfgrid_types::ConfigError;

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Environment name → health base URL.
    pub environments: HashMap<String, String>,
    pub probe: ProbeSection,
    pub rollout: RolloutSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    pub timeout_ms: u64,
    /// Maximum tolerated error rate, in [0, 1].
    pub max_error_rate: f64,
    pub max_p95_latency_secs: f64,
    /// Metrics query base URL; omit to skip metrics gating.
    pub metrics_url: Option<String>,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_error_rate: 0.05,
            max_p95_latency_secs: 2.0,
            metrics_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RolloutSection {
    #[serde(flatten)]
    pub timing: RolloutConfig,
    /// Orchestration CLI to shell out to.
    pub kubectl_bin: String,
    /// Readiness polling bounds.
    pub wait_attempts: u32,
    pub wait_interval_ms: u64,
    /// Alerting webhook for audit events; omit to log them instead.
    pub audit_webhook_url: Option<String>,
}

impl Default for RolloutSection {
    fn default() -> Self {
        Self {
            timing: RolloutConfig::default(),
            kubectl_bin: "kubectl".to_string(),
            wait_attempts: 30,
            wait_interval_ms: 2_000,
            audit_webhook_url: None,
        }
    }
}

/// Load the config file, or defaults when it does not exist.
pub fn load(path: &Path) -> Result<CliConfig, ConfigError> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
    toml::from_str(&text).map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))
}

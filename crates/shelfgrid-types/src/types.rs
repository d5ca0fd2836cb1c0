//! Domain types for ShelfGrid deployment runs.
//!
//! A [`DeploymentRequest`] is validated once, then frozen for the life
//! of the run. The orchestrator is the single writer of the
//! [`DeploymentRun`]; stage results are appended and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConfigError;

/// Unique identifier for a deployment run.
pub type RunId = String;

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Request ───────────────────────────────────────────────────────

/// Deployment strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    BlueGreen,
    Canary,
    Rolling,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlueGreen => write!(f, "blue-green"),
            Self::Canary => write!(f, "canary"),
            Self::Rolling => write!(f, "rolling"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue-green" | "blue_green" | "bluegreen" => Ok(Self::BlueGreen),
            "canary" => Ok(Self::Canary),
            "rolling" => Ok(Self::Rolling),
            other => Err(format!(
                "unknown strategy: {other} (expected blue-green, canary, or rolling)"
            )),
        }
    }
}

/// Immutable description of what to deploy. Frozen once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRequest {
    pub strategy: Strategy,
    /// Artifact version to roll out (e.g. an OCI image tag).
    pub image_tag: String,
    /// Environment the run targets; also the base name for derived
    /// targets (`{env}-green`, `{env}-canary`).
    pub target_environment: String,
    /// Starting traffic percentage for canary runs (1-100).
    pub initial_canary_percent: u32,
    /// Environment name → health/metrics base URL.
    pub endpoints: HashMap<String, String>,
    /// Tag currently running; required by rolling rollback.
    pub previous_image_tag: Option<String>,
}

impl DeploymentRequest {
    /// Validate the request. Called before any stage executes; a failure
    /// here means the run never starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image_tag.trim().is_empty() {
            return Err(ConfigError::EmptyImageTag);
        }
        if self.target_environment.trim().is_empty() {
            return Err(ConfigError::EmptyEnvironment);
        }
        if self.strategy == Strategy::Canary
            && !(1..=100).contains(&self.initial_canary_percent)
        {
            return Err(ConfigError::CanaryPercentOutOfRange(
                self.initial_canary_percent,
            ));
        }
        if !self.endpoints.contains_key(&self.target_environment) {
            return Err(ConfigError::MissingEndpoint(
                self.target_environment.clone(),
            ));
        }
        if self.strategy == Strategy::Rolling && self.previous_image_tag.is_none() {
            return Err(ConfigError::MissingPreviousImageTag);
        }
        Ok(())
    }

    /// Health/metrics base URL for the target environment.
    pub fn target_endpoint(&self) -> Option<&str> {
        self.endpoints.get(&self.target_environment).map(|s| s.as_str())
    }
}

// ── Stages & history ──────────────────────────────────────────────

/// Named stage within a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    // Blue-green
    DeployGreen,
    SmokeTestGreen,
    SwitchTraffic,
    Monitor,
    CleanupBlue,
    // Canary
    DeployCanary,
    RouteTraffic,
    IncreaseTraffic,
    FullRollout,
    // Rolling
    UpdateBatch,
    RollbackBatches,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DeployGreen => "deploy_green",
            Self::SmokeTestGreen => "smoke_test_green",
            Self::SwitchTraffic => "switch_traffic",
            Self::Monitor => "monitor",
            Self::CleanupBlue => "cleanup_blue",
            Self::DeployCanary => "deploy_canary",
            Self::RouteTraffic => "route_traffic",
            Self::IncreaseTraffic => "increase_traffic",
            Self::FullRollout => "full_rollout",
            Self::UpdateBatch => "update_batch",
            Self::RollbackBatches => "rollback_batches",
        };
        f.write_str(name)
    }
}

/// Outcome of a single stage. Appended to the run history and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageResult {
    pub stage: Stage,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub success: bool,
    /// Numeric signals observed during the stage (sample counts, last
    /// error rate, batch index, traffic percent).
    pub metrics: HashMap<String, f64>,
    pub error_detail: Option<String>,
}

impl StageResult {
    /// Wall-clock duration of the stage.
    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }
}

// ── Run ───────────────────────────────────────────────────────────

/// Terminal state of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Succeeded,
    RolledBack,
    Failed,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        *self != Self::Pending
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::RolledBack => write!(f, "rolled_back"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A single deployment run, advanced only by the orchestrator.
///
/// `history` strictly reflects stage execution order; `outcome` is set
/// exactly once, at the terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRun {
    pub id: RunId,
    pub request: DeploymentRequest,
    pub current_stage: Option<Stage>,
    pub started_at_ms: u64,
    pub history: Vec<StageResult>,
    pub outcome: Outcome,
}

impl DeploymentRun {
    /// Create a pending run for a validated request.
    pub fn new(request: DeploymentRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request,
            current_stage: None,
            started_at_ms: epoch_millis(),
            history: Vec::new(),
            outcome: Outcome::Pending,
        }
    }

    /// Append a stage result. Single-writer; results are never edited
    /// after append.
    pub fn record(&mut self, result: StageResult) {
        self.current_stage = Some(result.stage);
        self.history.push(result);
    }

    /// Set the terminal outcome. May only be called once.
    pub fn finish(&mut self, outcome: Outcome) {
        debug_assert_eq!(self.outcome, Outcome::Pending, "outcome set twice");
        debug_assert!(outcome.is_terminal());
        self.outcome = outcome;
    }

    /// Whether a stage with the given name appears in the history.
    pub fn has_stage(&self, stage: Stage) -> bool {
        self.history.iter().any(|r| r.stage == stage)
    }
}

// ── Health ────────────────────────────────────────────────────────

/// One observation from the health probe. Consumed transiently by the
/// monitoring loop; only summaries land in the run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp_ms: u64,
    pub healthy: bool,
    /// Fraction of requests failing, in [0, 1].
    pub error_rate: f64,
    pub p95_latency_secs: f64,
}

impl HealthSample {
    /// A passing sample with clean signals.
    pub fn healthy_now() -> Self {
        Self {
            timestamp_ms: epoch_millis(),
            healthy: true,
            error_rate: 0.0,
            p95_latency_secs: 0.0,
        }
    }

    /// A failing sample carrying a degraded signal set.
    pub fn unhealthy_now() -> Self {
        Self {
            healthy: false,
            ..Self::healthy_now()
        }
    }
}

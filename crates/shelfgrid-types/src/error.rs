//! Error types shared across the ShelfGrid crates.

use thiserror::Error;

/// Errors surfaced before a run starts. These are the only errors a
/// caller of the orchestrator ever sees; everything after validation is
/// reported through the run's outcome and history.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("image tag must not be empty")]
    EmptyImageTag,

    #[error("target environment must not be empty")]
    EmptyEnvironment,

    #[error("canary percent must be in 1..=100, got {0}")]
    CanaryPercentOutOfRange(u32),

    #[error("no endpoint configured for environment: {0}")]
    MissingEndpoint(String),

    #[error("rolling strategy requires a previous image tag for rollback")]
    MissingPreviousImageTag,

    #[error("config file error: {0}")]
    File(String),
}

/// Errors from a collaborator (backend, traffic controller, probe,
/// metrics source). The orchestrator converts every one of these into a
/// stage failure; they never propagate to the run's caller.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator call timed out after {0}ms")]
    Timeout(u64),
}

impl CollaboratorError {
    /// Convenience for wrapping transport errors.
    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        Self::Unavailable(detail.to_string())
    }
}

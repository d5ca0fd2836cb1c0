//! shelfgrid-types — shared domain types for ShelfGrid deployments.
//!
//! The data model for a single deployment run: the immutable
//! [`DeploymentRequest`], the [`DeploymentRun`] advanced by the
//! orchestrator, and the append-only [`StageResult`] history that forms
//! the run's audit trail.
//!
//! All types are JSON-serializable; a finished `DeploymentRun` is the
//! sole contract a caller observes.

pub mod error;
pub mod types;

pub use error::{CollaboratorError, ConfigError};
pub use types::*;

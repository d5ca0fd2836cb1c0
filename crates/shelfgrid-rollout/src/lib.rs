//! shelfgrid-rollout — the ShelfGrid deployment orchestrator.
//!
//! Drives one deployment run at a time through an explicit state
//! machine: blue-green (deploy green, smoke test, switch, monitor,
//! cleanup), canary (escalating traffic with per-cycle monitoring), or
//! rolling (batch-by-batch with partial rollback).
//!
//! # Components
//!
//! - **`strategy`** — Timing configuration and batch/percent math
//! - **`backend`** — [`DeploymentBackend`] collaborator trait
//! - **`traffic`** — [`TrafficController`] collaborator trait
//! - **`audit`** — [`AuditSink`] trait plus tracing/webhook sinks
//! - **`orchestrator`** — The state machine itself
//!
//! # Failure semantics
//!
//! Collaborator errors never escape a stage: they are caught at the
//! stage boundary, logged, and mapped to that stage's failure
//! transition, so the cleanup/rollback path always runs. A caller
//! observes only the terminal outcome and the stage history.

pub mod audit;
pub mod backend;
pub mod orchestrator;
pub mod strategy;
pub mod traffic;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink, WebhookAuditSink};
pub use backend::DeploymentBackend;
pub use orchestrator::Orchestrator;
pub use strategy::RolloutConfig;
pub use traffic::TrafficController;

//! Traffic controller collaborator trait.

use shelfgrid_types::CollaboratorError;

/// Adjusts what fraction of live traffic reaches a named target.
///
/// `route` must be idempotent: re-issuing the current percentage is a
/// no-op success. The orchestrator never retries traffic operations;
/// a single `Ok(false)` or `Err` fails the stage.
pub trait TrafficController {
    /// Set the traffic weight for `target` to `percent` (0-100).
    fn route(
        &self,
        target: &str,
        percent: u32,
    ) -> impl std::future::Future<Output = Result<bool, CollaboratorError>> + Send;

    /// Move all traffic to `to` and none to `from`, as a single
    /// orchestration call from the caller's perspective.
    fn switch_all(
        &self,
        to: &str,
        from: &str,
    ) -> impl std::future::Future<Output = Result<bool, CollaboratorError>> + Send;
}

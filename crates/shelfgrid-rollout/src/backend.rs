//! Deployment backend collaborator trait.

use std::ops::Range;

use shelfgrid_types::CollaboratorError;

/// Applies artifact versions to named targets on the orchestration
/// substrate. All operations are synchronous from the orchestrator's
/// point of view: it does not proceed until each call returns.
///
/// Business-rule refusals (target missing, rollout rejected) are
/// `Ok(false)`; transport failures are `Err`. The orchestrator treats
/// both as stage failures.
pub trait DeploymentBackend {
    /// Apply `image_tag` to the target. A batch range scopes the update
    /// to those replica indices (rolling updates and their rollbacks);
    /// `None` updates the whole target.
    fn deploy(
        &self,
        target: &str,
        image_tag: &str,
        batch: Option<Range<u32>>,
    ) -> impl std::future::Future<Output = Result<bool, CollaboratorError>> + Send;

    /// Poll until the target (or the batch within it) reports ready,
    /// or a bounded number of attempts elapses. `Ok(false)` means the
    /// bound was hit.
    fn wait_ready(
        &self,
        target: &str,
        batch: Option<Range<u32>>,
    ) -> impl std::future::Future<Output = Result<bool, CollaboratorError>> + Send;

    /// Remove the target entirely.
    fn delete(
        &self,
        target: &str,
    ) -> impl std::future::Future<Output = Result<bool, CollaboratorError>> + Send;

    /// Revert the target to its previously applied version.
    fn rollback_to_previous(
        &self,
        target: &str,
    ) -> impl std::future::Future<Output = Result<bool, CollaboratorError>> + Send;
}

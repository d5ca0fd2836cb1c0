pub mod deploy;
pub mod validate;

use shelfgrid_types::{DeploymentRequest, Strategy};

use crate::config::CliConfig;

/// Assemble a request from CLI arguments plus the configured
/// environment→endpoint map.
pub(crate) fn build_request(
    cfg: &CliConfig,
    strategy: Strategy,
    image_tag: &str,
    environment: &str,
    canary_percent: u32,
    previous_image_tag: Option<String>,
) -> DeploymentRequest {
    DeploymentRequest {
        strategy,
        image_tag: image_tag.to_string(),
        target_environment: environment.to_string(),
        initial_canary_percent: canary_percent,
        endpoints: cfg.environments.clone(),
        previous_image_tag,
    }
}

//! The `validate` command — check config and request, deploy nothing.

use std::path::Path;

use clap::Args;

use shelfgrid_types::Strategy;

use crate::config;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Strategy: blue-green, canary, or rolling.
    #[arg(long)]
    pub strategy: Strategy,

    /// Artifact version that would be rolled out.
    #[arg(long)]
    pub image_tag: String,

    /// Target environment; must have an endpoint in the config.
    #[arg(long)]
    pub environment: String,

    /// Starting canary traffic percentage (1-100).
    #[arg(long, default_value_t = 10)]
    pub canary_percent: u32,

    /// Currently running tag; required for rolling rollback.
    #[arg(long)]
    pub previous_image_tag: Option<String>,
}

pub fn run(config_path: &Path, args: ValidateArgs) -> anyhow::Result<i32> {
    let cfg = match config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            return Ok(2);
        }
    };

    let request = super::build_request(
        &cfg,
        args.strategy,
        &args.image_tag,
        &args.environment,
        args.canary_percent,
        args.previous_image_tag,
    );

    match request.validate() {
        Ok(()) => {
            println!(
                "ok: {} deploy of {} to {}",
                request.strategy, request.image_tag, request.target_environment
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("invalid request: {e}");
            Ok(2)
        }
    }
}

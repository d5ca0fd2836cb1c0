//! The `deploy` command — assemble collaborators and drive one run.

use std::path::Path;
use std::time::Duration;

use clap::Args;

use shelfgrid_health::{HttpHealthProbe, HttpMetricsSource, ProbeConfig};
use shelfgrid_rollout::{
    AuditEvent, AuditSink, Orchestrator, TracingAuditSink, WebhookAuditSink,
};
use shelfgrid_types::{DeploymentRun, Outcome, Strategy};

use crate::config;
use crate::kube::{KubeBackend, KubeTrafficController};

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Strategy: blue-green, canary, or rolling.
    #[arg(long)]
    pub strategy: Strategy,

    /// Artifact version to roll out.
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

    /// Print the full run as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Audit sink chosen at assembly time.
enum CliSink {
    Tracing(TracingAuditSink),
    Webhook(WebhookAuditSink),
}

impl AuditSink for CliSink {
    async fn record(&self, event: &AuditEvent) {
        match self {
            Self::Tracing(sink) => sink.record(event).await,
            Self::Webhook(sink) => sink.record(event).await,
        }
    }
}

/// Returns the process exit code: 0 succeeded, 1 rolled back or
/// failed, 2 configuration error.
pub async fn run(config_path: &Path, args: DeployArgs) -> anyhow::Result<i32> {
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
        args.previous_image_tag.clone(),
    );

    let probe_timeout = Duration::from_millis(cfg.probe.timeout_ms);
    let probe_config = ProbeConfig {
        timeout: probe_timeout,
        max_error_rate: cfg.probe.max_error_rate,
        max_p95_latency_secs: cfg.probe.max_p95_latency_secs,
    };
    let metrics = cfg
        .probe
        .metrics_url
        .as_deref()
        .map(|url| HttpMetricsSource::new(url, probe_timeout));
    let probe =
        HttpHealthProbe::with_optional_metrics(cfg.environments.clone(), probe_config, metrics);

    let backend = KubeBackend::new(
        cfg.rollout.kubectl_bin.clone(),
        cfg.rollout.wait_attempts,
        Duration::from_millis(cfg.rollout.wait_interval_ms),
    );
    let traffic = KubeTrafficController::new(cfg.rollout.kubectl_bin.clone());
    let sink = match &cfg.rollout.audit_webhook_url {
        Some(url) => CliSink::Webhook(WebhookAuditSink::new(url.clone(), Duration::from_secs(5))),
        None => CliSink::Tracing(TracingAuditSink),
    };

    let orchestrator = Orchestrator::new(backend, traffic, probe, sink, cfg.rollout.timing.clone());

    let run = match orchestrator.run(request).await {
        Ok(run) => run,
        Err(e) => {
            eprintln!("invalid request: {e}");
            return Ok(2);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_history(&run);
    }

    Ok(match run.outcome {
        Outcome::Succeeded => 0,
        _ => 1,
    })
}

fn print_history(run: &DeploymentRun) {
    println!(
        "run {} — {} to {} ({})",
        run.id, run.request.image_tag, run.request.target_environment, run.request.strategy
    );
    println!("{:<20} {:<8} {:>10}  DETAIL", "STAGE", "RESULT", "DURATION");
    for result in &run.history {
        println!(
            "{:<20} {:<8} {:>8}ms  {}",
            result.stage.to_string(),
            if result.success { "ok" } else { "failed" },
            result.duration_ms(),
            result.error_detail.as_deref().unwrap_or("-"),
        );
    }
    println!("outcome: {}", run.outcome);
}

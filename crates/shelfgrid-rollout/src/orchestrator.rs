//! Deployment orchestrator — drives one run through its strategy's
//! state machine.
//!
//! Stages execute strictly in order; each one is bracketed, appended
//! to the run history, and mirrored to the audit sink. Collaborator
//! errors are caught at the stage boundary and mapped to stage
//! failure so the cleanup/rollback transition always runs.

use std::collections::HashMap;
use std::ops::Range;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn};

use shelfgrid_health::{check_window, HealthProbe, WindowReport};
use shelfgrid_types::{
    epoch_millis, CollaboratorError, ConfigError, DeploymentRequest, DeploymentRun, HealthSample,
    Outcome, Stage, StageResult, Strategy,
};

use crate::audit::{AuditEvent, AuditSink};
use crate::backend::DeploymentBackend;
use crate::strategy::{self, RolloutConfig};
use crate::traffic::TrafficController;

/// What a stage body reports back to the bracketing logic.
struct StageOutcome {
    success: bool,
    metrics: HashMap<String, f64>,
    detail: Option<String>,
}

impl StageOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            metrics: HashMap::new(),
            detail: None,
        }
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            metrics: HashMap::new(),
            detail: Some(detail.into()),
        }
    }

    fn from_flag(success: bool, fail_detail: &str) -> Self {
        if success {
            Self::ok()
        } else {
            Self::fail(fail_detail)
        }
    }

    fn from_sample(sample: &HealthSample, fail_detail: &str) -> Self {
        let mut metrics = HashMap::new();
        metrics.insert("error_rate".to_string(), sample.error_rate);
        metrics.insert("p95_latency_secs".to_string(), sample.p95_latency_secs);
        Self {
            success: sample.healthy,
            metrics,
            detail: (!sample.healthy).then(|| fail_detail.to_string()),
        }
    }

    fn metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }
}

/// Summarize a monitoring window into a stage outcome.
fn window_outcome(report: &WindowReport) -> StageOutcome {
    let unhealthy = report.samples.iter().filter(|s| !s.healthy).count();
    let mut outcome = StageOutcome {
        success: report.passed,
        metrics: HashMap::new(),
        detail: None,
    }
    .metric("samples", report.samples.len() as f64)
    .metric("unhealthy_samples", unhealthy as f64);

    if let Some(last) = report.samples.last() {
        outcome = outcome
            .metric("last_error_rate", last.error_rate)
            .metric("last_p95_latency_secs", last.p95_latency_secs);
    }

    if report.cancelled {
        outcome.detail = Some("monitor window cancelled".to_string());
    } else if !report.passed {
        outcome.detail = Some(format!(
            "unhealthy sample {} aborted window",
            report.samples.len()
        ));
    }
    outcome
}

/// Drives blue-green, canary, and rolling deployments over the
/// collaborator traits. One run at a time; callers serialize runs
/// against the same target environment.
pub struct Orchestrator<B, T, P, A> {
    backend: B,
    traffic: T,
    probe: P,
    audit: A,
    config: RolloutConfig,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl<B, T, P, A> Orchestrator<B, T, P, A>
where
    B: DeploymentBackend,
    T: TrafficController,
    P: HealthProbe,
    A: AuditSink,
{
    pub fn new(backend: B, traffic: T, probe: P, audit: A, config: RolloutConfig) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            backend,
            traffic,
            probe,
            audit,
            config,
            cancel_tx,
            cancel_rx,
        }
    }

    /// Handle for cancelling the run. Cancellation takes effect between
    /// monitor samples, never mid-call to a collaborator.
    pub fn cancel_handle(&self) -> watch::Sender<bool> {
        self.cancel_tx.clone()
    }

    /// Execute a deployment run to completion.
    ///
    /// A malformed request is the only error surfaced here; once the
    /// first stage starts, the caller observes failures solely through
    /// the returned run's outcome and history.
    pub async fn run(&self, request: DeploymentRequest) -> Result<DeploymentRun, ConfigError> {
        request.validate()?;
        let mut run = DeploymentRun::new(request);
        info!(
            run_id = %run.id,
            strategy = %run.request.strategy,
            image_tag = %run.request.image_tag,
            environment = %run.request.target_environment,
            "deployment run starting"
        );

        match run.request.strategy {
            Strategy::BlueGreen => self.run_blue_green(&mut run).await,
            Strategy::Canary => self.run_canary(&mut run).await,
            Strategy::Rolling => self.run_rolling(&mut run).await,
        }

        info!(
            run_id = %run.id,
            outcome = %run.outcome,
            stages = run.history.len(),
            "deployment run finished"
        );
        Ok(run)
    }

    // ── Stage bracketing ──────────────────────────────────────────

    /// Run one stage: time it, map collaborator errors to failure,
    /// append the result to the history, and emit the audit event.
    async fn run_stage<Fut>(&self, run: &mut DeploymentRun, stage: Stage, body: Fut) -> bool
    where
        Fut: std::future::Future<Output = Result<StageOutcome, CollaboratorError>>,
    {
        let started = Instant::now();
        let started_at_ms = epoch_millis();
        info!(run_id = %run.id, %stage, "stage starting");

        let outcome = match body.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(run_id = %run.id, %stage, error = %e, "collaborator error treated as stage failure");
                StageOutcome::fail(e.to_string())
            }
        };

        let result = StageResult {
            stage,
            started_at_ms,
            ended_at_ms: epoch_millis(),
            success: outcome.success,
            metrics: outcome.metrics,
            error_detail: outcome.detail,
        };

        let event = AuditEvent {
            run_id: run.id.clone(),
            stage,
            success: result.success,
            duration_ms: started.elapsed().as_millis() as u64,
            detail: result.error_detail.clone(),
        };
        self.audit.record(&event).await;

        if result.success {
            info!(run_id = %run.id, %stage, duration_ms = event.duration_ms, "stage succeeded");
        } else {
            warn!(
                run_id = %run.id,
                %stage,
                duration_ms = event.duration_ms,
                detail = result.error_detail.as_deref().unwrap_or(""),
                "stage failed"
            );
        }

        let success = result.success;
        run.record(result);
        success
    }

    // ── Failure-transition helpers (best effort, logged) ──────────

    async fn best_effort_delete(&self, target: &str) {
        match self.backend.delete(target).await {
            Ok(true) => info!(%target, "target cleaned up"),
            Ok(false) => warn!(%target, "target cleanup refused, manual cleanup needed"),
            Err(e) => warn!(%target, error = %e, "target cleanup failed, manual cleanup needed"),
        }
    }

    async fn rollback_canary(&self, canary: &str) {
        match self.traffic.route(canary, 0).await {
            Ok(true) => info!(%canary, "canary routing removed"),
            Ok(false) => warn!(%canary, "canary routing removal refused"),
            Err(e) => warn!(%canary, error = %e, "canary routing removal failed"),
        }
        self.best_effort_delete(canary).await;
    }

    // ── Blue-green ────────────────────────────────────────────────

    /// `DeployGreen → SmokeTestGreen → SwitchTraffic → Monitor →
    /// CleanupBlue`. Blue keeps serving until the switch, so early
    /// failures only need the green target removed.
    async fn run_blue_green(&self, run: &mut DeploymentRun) {
        let env = run.request.target_environment.clone();
        let green = format!("{env}-green");
        let blue = format!("{env}-blue");
        let tag = run.request.image_tag.clone();

        let ok = self
            .run_stage(run, Stage::DeployGreen, async {
                if !self.backend.deploy(&green, &tag, None).await? {
                    return Ok(StageOutcome::fail("green deploy rejected"));
                }
                if !self.backend.wait_ready(&green, None).await? {
                    return Ok(StageOutcome::fail("green never became ready"));
                }
                Ok(StageOutcome::ok())
            })
            .await;
        if !ok {
            self.best_effort_delete(&green).await;
            run.finish(Outcome::Failed);
            return;
        }

        let ok = self
            .run_stage(run, Stage::SmokeTestGreen, async {
                let sample = self.probe.check(&env).await;
                Ok(StageOutcome::from_sample(&sample, "smoke test unhealthy"))
            })
            .await;
        if !ok {
            self.best_effort_delete(&green).await;
            run.finish(Outcome::Failed);
            return;
        }

        let ok = self
            .run_stage(run, Stage::SwitchTraffic, async {
                let switched = self.traffic.switch_all(&green, &blue).await?;
                Ok(StageOutcome::from_flag(switched, "traffic switch rejected"))
            })
            .await;
        if !ok {
            self.best_effort_delete(&green).await;
            run.finish(Outcome::Failed);
            return;
        }

        let mut cancel = self.cancel_rx.clone();
        let ok = self
            .run_stage(run, Stage::Monitor, async {
                let report = check_window(
                    &self.probe,
                    &env,
                    self.config.monitor_interval(),
                    self.config.monitor_duration(),
                    &mut cancel,
                )
                .await;
                Ok(window_outcome(&report))
            })
            .await;
        if !ok {
            // Green is live and misbehaving: put blue back, revert green.
            match self.traffic.switch_all(&blue, &green).await {
                Ok(true) => info!(%blue, "traffic switched back to blue"),
                Ok(false) => warn!(%blue, "traffic switch back refused"),
                Err(e) => warn!(%blue, error = %e, "traffic switch back failed"),
            }
            match self.backend.rollback_to_previous(&green).await {
                Ok(true) => info!(%green, "green rolled back to previous version"),
                Ok(false) => warn!(%green, "green rollback refused"),
                Err(e) => warn!(%green, error = %e, "green rollback failed"),
            }
            run.finish(Outcome::RolledBack);
            return;
        }

        let ok = self
            .run_stage(run, Stage::CleanupBlue, async {
                let deleted = self.backend.delete(&blue).await?;
                Ok(StageOutcome::from_flag(deleted, "blue cleanup refused"))
            })
            .await;
        // Traffic already moved; a failed cleanup needs manual action.
        run.finish(if ok { Outcome::Succeeded } else { Outcome::Failed });
    }

    // ── Canary ────────────────────────────────────────────────────

    /// `DeployCanary → RouteTraffic → [Monitor → IncreaseTraffic]×N →
    /// FullRollout`. Traffic is capped at 50% until the final
    /// promotion; a failed cycle removes the canary entirely.
    async fn run_canary(&self, run: &mut DeploymentRun) {
        let env = run.request.target_environment.clone();
        let canary = format!("{env}-canary");
        let stable = env.clone();
        let tag = run.request.image_tag.clone();
        let initial = run.request.initial_canary_percent;

        let ok = self
            .run_stage(run, Stage::DeployCanary, async {
                if !self.backend.deploy(&canary, &tag, None).await? {
                    return Ok(StageOutcome::fail("canary deploy rejected"));
                }
                if !self.backend.wait_ready(&canary, None).await? {
                    return Ok(StageOutcome::fail("canary never became ready"));
                }
                Ok(StageOutcome::ok())
            })
            .await;
        if !ok {
            self.best_effort_delete(&canary).await;
            run.finish(Outcome::Failed);
            return;
        }

        let ok = self
            .run_stage(run, Stage::RouteTraffic, async {
                let routed = self.traffic.route(&canary, initial).await?;
                Ok(StageOutcome::from_flag(routed, "initial canary routing rejected")
                    .metric("traffic_percent", initial as f64))
            })
            .await;
        if !ok {
            self.rollback_canary(&canary).await;
            run.finish(Outcome::Failed);
            return;
        }

        let mut percent = initial;
        for cycle in 0..self.config.canary_cycles {
            let mut cancel = self.cancel_rx.clone();
            let ok = self
                .run_stage(run, Stage::Monitor, async {
                    let report = check_window(
                        &self.probe,
                        &env,
                        self.config.monitor_interval(),
                        self.config.canary_cycle(),
                        &mut cancel,
                    )
                    .await;
                    Ok(window_outcome(&report)
                        .metric("cycle", cycle as f64)
                        .metric("traffic_percent", percent as f64))
                })
                .await;
            if !ok {
                self.rollback_canary(&canary).await;
                run.finish(Outcome::RolledBack);
                return;
            }

            // The last cycle promotes directly; no intermediate bump.
            if cycle + 1 < self.config.canary_cycles {
                let next = strategy::canary_percent(initial, cycle);
                let ok = self
                    .run_stage(run, Stage::IncreaseTraffic, async {
                        let routed = self.traffic.route(&canary, next).await?;
                        Ok(StageOutcome::from_flag(routed, "traffic increase rejected")
                            .metric("traffic_percent", next as f64))
                    })
                    .await;
                if !ok {
                    self.rollback_canary(&canary).await;
                    run.finish(Outcome::RolledBack);
                    return;
                }
                percent = next;
            }
        }

        // Canary already carries the majority of traffic here, so a
        // failed promotion is left for manual intervention.
        let ok = self
            .run_stage(run, Stage::FullRollout, async {
                if !self.traffic.switch_all(&canary, &stable).await? {
                    return Ok(StageOutcome::fail("promotion switch rejected"));
                }
                if !self.backend.delete(&stable).await? {
                    return Ok(StageOutcome::fail("stable target cleanup refused"));
                }
                Ok(StageOutcome::ok().metric("traffic_percent", 100.0))
            })
            .await;
        run.finish(if ok { Outcome::Succeeded } else { Outcome::Failed });
    }

    // ── Rolling ───────────────────────────────────────────────────

    /// Update replicas batch by batch; a failure reverts only the
    /// batches already updated and leaves the rest untouched.
    async fn run_rolling(&self, run: &mut DeploymentRun) {
        let env = run.request.target_environment.clone();
        let tag = run.request.image_tag.clone();
        let Some(prev_tag) = run.request.previous_image_tag.clone() else {
            // validate() rejects this before any stage executes.
            run.finish(Outcome::Failed);
            return;
        };

        let parts = strategy::batches(self.config.total_replicas);
        let total_batches = parts.len();
        let mut updated: Vec<Range<u32>> = Vec::new();

        for (index, batch) in parts.into_iter().enumerate() {
            let b = batch.clone();
            let ok = self
                .run_stage(run, Stage::UpdateBatch, async {
                    if !self.backend.deploy(&env, &tag, Some(b.clone())).await? {
                        return Ok(StageOutcome::fail(format!("batch {index} update rejected")));
                    }
                    if !self.backend.wait_ready(&env, Some(b.clone())).await? {
                        return Ok(StageOutcome::fail(format!(
                            "batch {index} never became ready"
                        )));
                    }
                    let sample = self.probe.check(&env).await;
                    Ok(StageOutcome::from_sample(
                        &sample,
                        &format!("batch {index} unhealthy after update"),
                    )
                    .metric("batch", index as f64)
                    .metric("batch_start", b.start as f64)
                    .metric("batch_end", b.end as f64)
                    .metric("total_batches", total_batches as f64))
                })
                .await;

            if !ok {
                let reverted = updated.clone();
                self.run_stage(run, Stage::RollbackBatches, async {
                    let mut all_reverted = true;
                    for b in &reverted {
                        match self.backend.deploy(&env, &prev_tag, Some(b.clone())).await {
                            Ok(true) => {}
                            Ok(false) => {
                                warn!(%env, batch_start = b.start, "batch revert refused");
                                all_reverted = false;
                            }
                            Err(e) => {
                                warn!(%env, batch_start = b.start, error = %e, "batch revert failed");
                                all_reverted = false;
                            }
                        }
                    }
                    Ok(StageOutcome::from_flag(all_reverted, "some batches failed to revert")
                        .metric("reverted_batches", reverted.len() as f64))
                })
                .await;
                run.finish(Outcome::Failed);
                return;
            }
            updated.push(batch);
        }

        run.finish(Outcome::Succeeded);
    }
}

//! End-to-end strategy walks against mock collaborators.

use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use shelfgrid_health::HealthProbe;
use shelfgrid_rollout::{
    AuditEvent, AuditSink, DeploymentBackend, Orchestrator, RolloutConfig, TrafficController,
};
use shelfgrid_types::{
    CollaboratorError, DeploymentRequest, HealthSample, Outcome, Stage, Strategy,
};

// ── Mock collaborators ────────────────────────────────────────────

#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.contains(needle))
    }
}

fn batch_label(batch: &Option<Range<u32>>) -> String {
    match batch {
        Some(r) => format!(" [{}-{}]", r.start, r.end.saturating_sub(1)),
        None => String::new(),
    }
}

/// Backend that logs every call. Individual operations can be scripted
/// with per-call results; unscripted calls succeed.
#[derive(Default)]
struct MockBackend {
    log: CallLog,
    deploy_script: Mutex<VecDeque<Result<bool, CollaboratorError>>>,
    wait_script: Mutex<VecDeque<Result<bool, CollaboratorError>>>,
    delete_ok: bool,
    rollback_ok: bool,
}

impl MockBackend {
    fn healthy(log: CallLog) -> Self {
        Self {
            log,
            delete_ok: true,
            rollback_ok: true,
            ..Default::default()
        }
    }

    fn script_deploy(self, results: Vec<Result<bool, CollaboratorError>>) -> Self {
        *self.deploy_script.lock().unwrap() = results.into();
        self
    }

    fn script_wait(self, results: Vec<Result<bool, CollaboratorError>>) -> Self {
        *self.wait_script.lock().unwrap() = results.into();
        self
    }
}

fn next_scripted(
    script: &Mutex<VecDeque<Result<bool, CollaboratorError>>>,
) -> Result<bool, CollaboratorError> {
    script.lock().unwrap().pop_front().unwrap_or(Ok(true))
}

impl DeploymentBackend for &MockBackend {
    async fn deploy(
        &self,
        target: &str,
        image_tag: &str,
        batch: Option<Range<u32>>,
    ) -> Result<bool, CollaboratorError> {
        self.log
            .push(format!("deploy {target} {image_tag}{}", batch_label(&batch)));
        next_scripted(&self.deploy_script)
    }

    async fn wait_ready(
        &self,
        target: &str,
        batch: Option<Range<u32>>,
    ) -> Result<bool, CollaboratorError> {
        self.log
            .push(format!("wait_ready {target}{}", batch_label(&batch)));
        next_scripted(&self.wait_script)
    }

    async fn delete(&self, target: &str) -> Result<bool, CollaboratorError> {
        self.log.push(format!("delete {target}"));
        Ok(self.delete_ok)
    }

    async fn rollback_to_previous(&self, target: &str) -> Result<bool, CollaboratorError> {
        self.log.push(format!("rollback {target}"));
        Ok(self.rollback_ok)
    }
}

/// Traffic controller with observable per-target weights. `route` is
/// idempotent: setting the current weight changes nothing.
#[derive(Default)]
struct MockTraffic {
    log: CallLog,
    weights: Mutex<HashMap<String, u32>>,
}

impl MockTraffic {
    fn new(log: CallLog) -> Self {
        Self {
            log,
            weights: Mutex::new(HashMap::new()),
        }
    }

    fn weight(&self, target: &str) -> Option<u32> {
        self.weights.lock().unwrap().get(target).copied()
    }
}

impl TrafficController for &MockTraffic {
    async fn route(&self, target: &str, percent: u32) -> Result<bool, CollaboratorError> {
        self.log.push(format!("route {target} {percent}"));
        self.weights
            .lock()
            .unwrap()
            .insert(target.to_string(), percent);
        Ok(true)
    }

    async fn switch_all(&self, to: &str, from: &str) -> Result<bool, CollaboratorError> {
        self.log.push(format!("switch_all {to} {from}"));
        let mut weights = self.weights.lock().unwrap();
        weights.insert(to.to_string(), 100);
        weights.insert(from.to_string(), 0);
        Ok(true)
    }
}

/// Probe replaying a scripted verdict sequence; the last entry repeats.
struct ScriptedProbe {
    script: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new(script: Vec<bool>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    fn always_healthy() -> Self {
        Self::new(vec![true])
    }
}

impl HealthProbe for &ScriptedProbe {
    async fn check(&self, _target: &str) -> HealthSample {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        let healthy = *self.script.get(i).or(self.script.last()).unwrap_or(&true);
        if healthy {
            HealthSample::healthy_now()
        } else {
            HealthSample {
                error_rate: 0.3,
                ..HealthSample::unhealthy_now()
            }
        }
    }
}

#[derive(Default)]
struct CapturingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for &CapturingSink {
    async fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────────

fn request(strategy: Strategy, initial_percent: u32) -> DeploymentRequest {
    DeploymentRequest {
        strategy,
        image_tag: "shelf-api:v2".to_string(),
        target_environment: "production".to_string(),
        initial_canary_percent: initial_percent,
        endpoints: HashMap::from([(
            "production".to_string(),
            "http://127.0.0.1:1".to_string(),
        )]),
        previous_image_tag: Some("shelf-api:v1".to_string()),
    }
}

/// Millisecond-scale timings: two samples per monitor window/cycle.
fn fast_config() -> RolloutConfig {
    RolloutConfig {
        monitor_interval_ms: 1,
        monitor_duration_ms: 2,
        canary_cycles: 3,
        canary_cycle_ms: 2,
        total_replicas: 10,
    }
}

fn stages(run: &shelfgrid_types::DeploymentRun) -> Vec<Stage> {
    run.history.iter().map(|r| r.stage).collect()
}

// ── Blue-green ────────────────────────────────────────────────────

#[tokio::test]
async fn blue_green_happy_path() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::BlueGreen, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Succeeded);
    assert_eq!(
        stages(&run),
        vec![
            Stage::DeployGreen,
            Stage::SmokeTestGreen,
            Stage::SwitchTraffic,
            Stage::Monitor,
            Stage::CleanupBlue,
        ]
    );
    assert!(run.history.iter().all(|r| r.success));
    assert!(log.contains("deploy production-green shelf-api:v2"));
    assert!(log.contains("switch_all production-green production-blue"));
    assert_eq!(log.entries().last().unwrap(), "delete production-blue");
    assert_eq!(sink.events.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn blue_green_failed_smoke_test_never_switches_traffic() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::new(vec![false]);
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::BlueGreen, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Failed);
    assert!(!run.has_stage(Stage::SwitchTraffic));
    assert_eq!(
        stages(&run),
        vec![Stage::DeployGreen, Stage::SmokeTestGreen]
    );
    // Blue still serves; green is torn down, not rolled back.
    assert!(log.contains("delete production-green"));
    assert!(!log.contains("switch_all"));
    assert!(!log.contains("rollback"));
}

#[tokio::test]
async fn blue_green_deploy_failure_cleans_up_green() {
    let log = CallLog::default();
    let backend =
        MockBackend::healthy(log.clone()).script_deploy(vec![Ok(false)]);
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::BlueGreen, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Failed);
    assert_eq!(stages(&run), vec![Stage::DeployGreen]);
    assert!(log.contains("delete production-green"));
}

#[tokio::test]
async fn blue_green_monitor_failure_rolls_back_to_blue() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    // Smoke sample healthy, first monitor sample unhealthy.
    let probe = ScriptedProbe::new(vec![true, false]);
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::BlueGreen, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::RolledBack);
    assert_eq!(run.history.last().unwrap().stage, Stage::Monitor);
    assert!(!run.history.last().unwrap().success);
    // Traffic back to blue, then green reverted.
    assert!(log.contains("switch_all production-blue production-green"));
    assert!(log.contains("rollback production-green"));
    // Blue must never be deleted on this path.
    assert!(!log.contains("delete production-blue"));
    assert_eq!(traffic.weight("production-blue"), Some(100));
    assert_eq!(traffic.weight("production-green"), Some(0));
}

// ── Canary ────────────────────────────────────────────────────────

#[tokio::test]
async fn canary_escalates_ten_twenty_thirty_then_full() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Canary, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Succeeded);
    let routes: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("route production-canary"))
        .collect();
    assert_eq!(
        routes,
        vec![
            "route production-canary 10",
            "route production-canary 20",
            "route production-canary 30",
        ]
    );
    assert!(log.contains("switch_all production-canary production"));
    assert!(log.contains("delete production"));
    assert_eq!(run.history.last().unwrap().stage, Stage::FullRollout);
}

#[tokio::test]
async fn canary_percentages_never_exceed_fifty_before_promotion() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Canary, 30)).await.unwrap();
    assert_eq!(run.outcome, Outcome::Succeeded);

    let mut prev = 0;
    for entry in log.entries() {
        if let Some(rest) = entry.strip_prefix("route production-canary ") {
            let pct: u32 = rest.parse().unwrap();
            assert!(pct <= 50, "pre-promotion percent above cap: {entry}");
            assert!(pct >= prev, "percent decreased: {entry}");
            prev = pct;
        }
    }
}

#[tokio::test]
async fn canary_monitor_failure_rolls_back_immediately() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    // Cycle 0 passes (two samples), cycle 1 fails on its first sample.
    let probe = ScriptedProbe::new(vec![true, true, false]);
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Canary, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::RolledBack);
    assert!(!run.has_stage(Stage::FullRollout));
    assert_eq!(
        stages(&run),
        vec![
            Stage::DeployCanary,
            Stage::RouteTraffic,
            Stage::Monitor,
            Stage::IncreaseTraffic,
            Stage::Monitor,
        ]
    );
    // Routing removed, canary deleted; stable target untouched.
    assert!(log.contains("route production-canary 0"));
    assert!(log.contains("delete production-canary"));
    assert!(!log.entries().iter().any(|e| e == "delete production"));
    assert_eq!(traffic.weight("production-canary"), Some(0));
}

#[tokio::test]
async fn canary_wait_ready_failure_fails_without_rollback_outcome() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone()).script_wait(vec![Ok(false)]);
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Canary, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Failed);
    assert_eq!(stages(&run), vec![Stage::DeployCanary]);
    assert!(log.contains("delete production-canary"));
}

// ── Rolling ───────────────────────────────────────────────────────

#[tokio::test]
async fn rolling_updates_ten_replicas_in_four_batches() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Rolling, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Succeeded);
    assert_eq!(stages(&run), vec![Stage::UpdateBatch; 4]);

    let updates: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("deploy production shelf-api:v2"))
        .collect();
    assert_eq!(
        updates,
        vec![
            "deploy production shelf-api:v2 [0-2]",
            "deploy production shelf-api:v2 [3-5]",
            "deploy production shelf-api:v2 [6-8]",
            "deploy production shelf-api:v2 [9-9]",
        ]
    );
}

#[tokio::test]
async fn rolling_failure_reverts_only_updated_batches() {
    let log = CallLog::default();
    // Batches 0 and 1 update fine; batch 2's update is rejected.
    let backend = MockBackend::healthy(log.clone())
        .script_deploy(vec![Ok(true), Ok(true), Ok(false)]);
    let traffic = MockTraffic::new(log.clone());
    let probe = ScriptedProbe::always_healthy();
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Rolling, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Failed);
    assert_eq!(run.history.last().unwrap().stage, Stage::RollbackBatches);
    assert!(run.history.last().unwrap().success);

    let reverts: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("deploy production shelf-api:v1"))
        .collect();
    // Only the two already-updated batches are reverted; [6-8] and
    // [9-9] were never touched.
    assert_eq!(
        reverts,
        vec![
            "deploy production shelf-api:v1 [0-2]",
            "deploy production shelf-api:v1 [3-5]",
        ]
    );
}

#[tokio::test]
async fn rolling_batch_health_failure_stops_the_walk() {
    let log = CallLog::default();
    let backend = MockBackend::healthy(log.clone());
    let traffic = MockTraffic::new(log.clone());
    // Batch 0 healthy, batch 1's check unhealthy.
    let probe = ScriptedProbe::new(vec![true, false]);
    let sink = CapturingSink::default();
    let orch = Orchestrator::new(&backend, &traffic, &probe, &sink, fast_config());

    let run = orch.run(request(Strategy::Rolling, 10)).await.unwrap();

    assert_eq!(run.outcome, Outcome::Failed);
    assert_eq!(
        stages(&run),
        vec![Stage::UpdateBatch, Stage::UpdateBatch, Stage::RollbackBatches]
    );
    let reverts: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("deploy production shelf-api:v1"))
        .collect();
    assert_eq!(reverts, vec!["deploy production shelf-api:v1 [0-2]"]);
}

// ── Traffic contract ──────────────────────────────────────────────

#[tokio::test]
async fn route_is_idempotent() {
    let traffic = MockTraffic::new(CallLog::default());

    assert!((&traffic).route("production-canary", 50).await.unwrap());
    let after_first = traffic.weight("production-canary");

    assert!((&traffic).route("production-canary", 50).await.unwrap());
    assert_eq!(traffic.weight("production-canary"), after_first);
    assert_eq!(after_first, Some(50));
}

//! Adapters over an orchestration CLI.
//!
//! Each operation is one spawned process. A non-zero exit is a
//! refusal (`Ok(false)`); a spawn failure means the CLI itself is
//! unavailable and surfaces as a collaborator error.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Mutex;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use shelfgrid_rollout::{DeploymentBackend, TrafficController};
use shelfgrid_types::CollaboratorError;

async fn exec(bin: &str, args: &[String]) -> Result<bool, CollaboratorError> {
    debug!(%bin, ?args, "spawning orchestration CLI");
    let output = Command::new(bin)
        .args(args)
        .output()
        .await
        .map_err(|e| CollaboratorError::unavailable(format!("spawn {bin}: {e}")))?;

    if output.status.success() {
        Ok(true)
    } else {
        debug!(
            %bin,
            code = output.status.code().unwrap_or(-1),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "orchestration CLI refused"
        );
        Ok(false)
    }
}

fn batch_args(batch: &Option<Range<u32>>) -> Option<String> {
    batch
        .as_ref()
        .map(|r| format!("--replicas={}-{}", r.start, r.end.saturating_sub(1)))
}

/// Deployment backend that shells out to a kubectl-compatible CLI.
pub struct KubeBackend {
    bin: String,
    wait_attempts: u32,
    wait_interval: Duration,
}

impl KubeBackend {
    pub fn new(bin: impl Into<String>, wait_attempts: u32, wait_interval: Duration) -> Self {
        Self {
            bin: bin.into(),
            wait_attempts,
            wait_interval,
        }
    }
}

impl DeploymentBackend for KubeBackend {
    async fn deploy(
        &self,
        target: &str,
        image_tag: &str,
        batch: Option<Range<u32>>,
    ) -> Result<bool, CollaboratorError> {
        let mut args = vec![
            "set-image".to_string(),
            target.to_string(),
            format!("app={image_tag}"),
        ];
        if let Some(scope) = batch_args(&batch) {
            args.push(scope);
        }
        exec(&self.bin, &args).await
    }

    async fn wait_ready(
        &self,
        target: &str,
        batch: Option<Range<u32>>,
    ) -> Result<bool, CollaboratorError> {
        let mut args = vec!["rollout-status".to_string(), target.to_string()];
        if let Some(scope) = batch_args(&batch) {
            args.push(scope);
        }

        for attempt in 1..=self.wait_attempts {
            if exec(&self.bin, &args).await? {
                return Ok(true);
            }
            debug!(%target, attempt, max = self.wait_attempts, "not ready yet");
            tokio::time::sleep(self.wait_interval).await;
        }
        Ok(false)
    }

    async fn delete(&self, target: &str) -> Result<bool, CollaboratorError> {
        exec(&self.bin, &["delete".to_string(), target.to_string()]).await
    }

    async fn rollback_to_previous(&self, target: &str) -> Result<bool, CollaboratorError> {
        exec(&self.bin, &["rollout-undo".to_string(), target.to_string()]).await
    }
}

/// Traffic controller that annotates targets with a weight value.
///
/// The last issued weight per target is cached so re-routing to the
/// current percentage never spawns a process.
pub struct KubeTrafficController {
    bin: String,
    weights: Mutex<HashMap<String, u32>>,
}

impl KubeTrafficController {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            weights: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, target: &str) -> Option<u32> {
        self.weights.lock().expect("weights lock").get(target).copied()
    }

    fn cache(&self, target: &str, percent: u32) {
        self.weights
            .lock()
            .expect("weights lock")
            .insert(target.to_string(), percent);
    }
}

impl TrafficController for KubeTrafficController {
    async fn route(&self, target: &str, percent: u32) -> Result<bool, CollaboratorError> {
        if self.cached(target) == Some(percent) {
            debug!(%target, percent, "already at weight, skipping");
            return Ok(true);
        }

        let ok = exec(
            &self.bin,
            &[
                "annotate".to_string(),
                target.to_string(),
                format!("traffic-weight={percent}"),
                "--overwrite".to_string(),
            ],
        )
        .await?;
        if ok {
            self.cache(target, percent);
        }
        Ok(ok)
    }

    async fn switch_all(&self, to: &str, from: &str) -> Result<bool, CollaboratorError> {
        // One invocation so the switch is atomic from our perspective.
        let ok = exec(
            &self.bin,
            &["switch-traffic".to_string(), to.to_string(), from.to_string()],
        )
        .await?;
        if ok {
            self.cache(to, 100);
            self.cache(from, 0);
        }
        Ok(ok)
    }
}

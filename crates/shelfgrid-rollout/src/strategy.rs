//! Strategy timing configuration and batch/percent math.

use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs shared by the three strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Interval between monitor samples.
    pub monitor_interval_ms: u64,
    /// Total blue-green monitor window.
    pub monitor_duration_ms: u64,
    /// Number of canary observation cycles before full rollout.
    pub canary_cycles: u32,
    /// Length of each canary cycle.
    pub canary_cycle_ms: u64,
    /// Replica count for rolling updates.
    pub total_replicas: u32,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            monitor_interval_ms: 30_000,
            monitor_duration_ms: 300_000,
            canary_cycles: 3,
            canary_cycle_ms: 120_000,
            total_replicas: 3,
        }
    }
}

impl RolloutConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn monitor_duration(&self) -> Duration {
        Duration::from_millis(self.monitor_duration_ms)
    }

    pub fn canary_cycle(&self) -> Duration {
        Duration::from_millis(self.canary_cycle_ms)
    }
}

/// Traffic percentage after canary cycle `cycle` (0-based).
///
/// Escalation is `initial * (cycle + 2)`, capped at 50 until the full
/// rollout promotes the canary to 100.
pub fn canary_percent(initial: u32, cycle: u32) -> u32 {
    initial.saturating_mul(cycle + 2).min(50)
}

/// Rolling batch size: a third of the replicas, minimum one.
pub fn batch_size(total_replicas: u32) -> u32 {
    (total_replicas / 3).max(1)
}

/// Partition replica indices `0..total_replicas` into update batches.
/// The last batch may be partial.
pub fn batches(total_replicas: u32) -> Vec<Range<u32>> {
    let size = batch_size(total_replicas);
    let mut out = Vec::new();
    let mut start = 0;
    while start < total_replicas {
        let end = (start + size).min(total_replicas);
        out.push(start..end);
        start = end;
    }
    out
}

//! Monitoring window — fixed-interval sampling with early abort.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use shelfgrid_types::HealthSample;

use crate::probe::HealthProbe;

/// Result of one monitoring window.
#[derive(Debug, Clone)]
pub struct WindowReport {
    /// True iff every sample evaluated in the window was healthy.
    pub passed: bool,
    /// True if the window was cancelled before completion.
    pub cancelled: bool,
    /// Samples actually taken; an early abort keeps the partial set.
    pub samples: Vec<HealthSample>,
}

impl WindowReport {
    fn cancelled(samples: Vec<HealthSample>) -> Self {
        Self {
            passed: false,
            cancelled: true,
            samples,
        }
    }
}

/// Evaluate `duration / interval` health samples (minimum one), one
/// every `interval`. The first unhealthy sample aborts the window
/// immediately; later samples are never taken.
///
/// Cancellation is checked at every suspension point between samples,
/// never mid-probe. A cancelled window is a failed window.
pub async fn check_window<P: HealthProbe>(
    probe: &P,
    target: &str,
    interval: Duration,
    duration: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> WindowReport {
    let total = if interval.is_zero() {
        1
    } else {
        (duration.as_millis() / interval.as_millis()).max(1) as u64
    };

    debug!(%target, total, interval_ms = interval.as_millis() as u64, "monitor window starting");

    let mut samples: Vec<HealthSample> = Vec::with_capacity(total as usize);
    let mut cancel_closed = false;

    for taken in 0..total {
        // Sleep out the interval, waking early only for cancellation.
        let deadline = Instant::now() + interval;
        loop {
            if *cancel.borrow() {
                info!(%target, taken, "monitor window cancelled");
                return WindowReport::cancelled(samples);
            }
            if cancel_closed {
                tokio::time::sleep_until(deadline).await;
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // Sender dropped; cancellation no longer possible.
                        cancel_closed = true;
                    }
                }
            }
        }

        let sample = probe.check(target).await;
        let healthy = sample.healthy;
        samples.push(sample);

        if !healthy {
            info!(
                %target,
                sample = taken + 1,
                total,
                "unhealthy sample, aborting monitor window"
            );
            return WindowReport {
                passed: false,
                cancelled: false,
                samples,
            };
        }
        debug!(%target, sample = taken + 1, total, "sample healthy");
    }

    WindowReport {
        passed: true,
        cancelled: false,
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe that replays a scripted sequence of sample verdicts,
    /// repeating the last one if the script runs out.
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

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HealthProbe for ScriptedProbe {
        async fn check(&self, _target: &str) -> HealthSample {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let healthy = *self.script.get(i).or(self.script.last()).unwrap_or(&true);
            if healthy {
                HealthSample::healthy_now()
            } else {
                HealthSample::unhealthy_now()
            }
        }
    }

    fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn window_evaluates_exact_sample_count() {
        let probe = ScriptedProbe::new(vec![true]);
        let (_tx, mut rx) = cancel_channel();

        // 10ms / 1ms → exactly 10 samples.
        let report = check_window(
            &probe,
            "production",
            Duration::from_millis(1),
            Duration::from_millis(10),
            &mut rx,
        )
        .await;

        assert!(report.passed);
        assert!(!report.cancelled);
        assert_eq!(report.samples.len(), 10);
        assert_eq!(probe.calls(), 10);
    }

    #[tokio::test]
    async fn unhealthy_sample_aborts_early() {
        // Sample 7 (index 6) fails; 8-10 must never run.
        let mut script = vec![true; 6];
        script.push(false);
        let probe = ScriptedProbe::new(script);
        let (_tx, mut rx) = cancel_channel();

        let report = check_window(
            &probe,
            "production",
            Duration::from_millis(1),
            Duration::from_millis(10),
            &mut rx,
        )
        .await;

        assert!(!report.passed);
        assert!(!report.cancelled);
        assert_eq!(report.samples.len(), 7);
        assert_eq!(probe.calls(), 7);
    }

    #[tokio::test]
    async fn short_duration_still_takes_one_sample() {
        let probe = ScriptedProbe::new(vec![true]);
        let (_tx, mut rx) = cancel_channel();

        let report = check_window(
            &probe,
            "production",
            Duration::from_millis(5),
            Duration::from_millis(1),
            &mut rx,
        )
        .await;

        assert!(report.passed);
        assert_eq!(report.samples.len(), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_window_takes_no_samples() {
        let probe = ScriptedProbe::new(vec![true]);
        let (tx, mut rx) = cancel_channel();
        tx.send(true).unwrap();

        let report = check_window(
            &probe,
            "production",
            Duration::from_millis(1),
            Duration::from_millis(10),
            &mut rx,
        )
        .await;

        assert!(!report.passed);
        assert!(report.cancelled);
        assert!(report.samples.is_empty());
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_mid_window_stops_sampling() {
        let probe = ScriptedProbe::new(vec![true]);
        let (tx, mut rx) = cancel_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let report = check_window(
            &probe,
            "production",
            Duration::from_millis(5),
            Duration::from_millis(500),
            &mut rx,
        )
        .await;

        assert!(report.cancelled);
        assert!(!report.passed);
        assert!(report.samples.len() < 100);
    }

    #[tokio::test]
    async fn dropped_cancel_sender_does_not_abort() {
        let probe = ScriptedProbe::new(vec![true]);
        let (tx, mut rx) = cancel_channel();
        drop(tx);

        let report = check_window(
            &probe,
            "production",
            Duration::from_millis(1),
            Duration::from_millis(5),
            &mut rx,
        )
        .await;

        assert!(report.passed);
        assert_eq!(report.samples.len(), 5);
    }
}

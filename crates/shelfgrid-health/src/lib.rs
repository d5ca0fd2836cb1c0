//! shelfgrid-health — health probing for ShelfGrid deployments.
//!
//! Provides the [`HealthProbe`] trait consumed by the orchestrator, an
//! HTTP implementation that combines a liveness check with thresholded
//! metrics queries, and the fixed-interval monitoring window used by
//! the monitor stages.
//!
//! # Architecture
//!
//! ```text
//! check_window()                 ── interval loop, cooperative cancel
//!   └── HealthProbe::check()    ── one HealthSample per tick
//!         ├── GET {base}/health ── liveness, 2xx expected
//!         └── MetricsSource     ── error_rate / p95_latency scalars
//! ```
//!
//! # Failure semantics
//!
//! Probe transport failures are *samples*, not errors: a connection
//! refused or timed-out liveness check yields an unhealthy sample. A
//! failed metrics query during a window defaults that one signal to
//! passing (fail-open) so an unreachable metrics backend cannot fail a
//! window on its own.

pub mod client;
pub mod metrics;
pub mod probe;
pub mod window;

pub use metrics::{HttpMetricsSource, MetricsSource};
pub use probe::{HealthProbe, HttpHealthProbe, NoMetrics, ProbeConfig};
pub use window::{check_window, WindowReport};

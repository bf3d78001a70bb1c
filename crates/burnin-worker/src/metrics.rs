//! Worker metrics collection.
//!
//! Counters and histograms go through the `metrics` facade. They are no-ops
//! until a recorder is installed, which [`init_prometheus`] does when a
//! metrics port is configured.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric name constants for consistency.
pub mod names {
    /// Settled deliveries by outcome.
    pub const JOBS_TOTAL: &str = "burnin_jobs_total";

    /// Failed attempts by error kind.
    pub const JOB_FAILURES_TOTAL: &str = "burnin_job_failures_total";

    /// Time from pull to settlement.
    pub const JOB_DURATION_SECONDS: &str = "burnin_job_duration_seconds";

    /// Time spent in the compositor, probe included.
    pub const COMPOSITOR_DURATION_SECONDS: &str = "burnin_compositor_duration_seconds";
}

/// Serve Prometheus metrics on `0.0.0.0:<port>`.
///
/// Must be called from within the tokio runtime.
pub fn init_prometheus(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Record a settled delivery.
pub fn record_job(outcome: &'static str, elapsed: Duration) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}

/// Record a failed attempt.
pub fn record_failure(kind: &'static str) {
    counter!(names::JOB_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Record one compositor run.
pub fn record_compositor(elapsed: Duration) {
    histogram!(names::COMPOSITOR_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

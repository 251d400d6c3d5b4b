//! Prometheus metrics for stream workers

use crate::error::{ErrorCategory, StreamError};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use strum::AsRefStr;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Outcome label of a processed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Success,
    Retried,
    Dlq,
    Malformed,
}

/// Install the global Prometheus recorder.
///
/// Idempotent; only the first call installs.
pub fn init_metrics() -> Result<(), StreamError> {
    PROMETHEUS_HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            info!("Prometheus metrics initialized");
            Ok::<_, metrics_exporter_prometheus::BuildError>(handle)
        })
        .map(|_| ())
        .map_err(|e| StreamError::Config(format!("metrics recorder: {e}")))
}

/// Text exposition of all metrics, `None` before [`init_metrics`].
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn record_job_processed(stream: &str, status: JobStatus) {
    counter!(
        "stream_worker_jobs_processed_total",
        "stream" => stream.to_string(),
        "status" => status.as_ref().to_string()
    )
    .increment(1);
}

pub fn record_job_duration(stream: &str, elapsed: Duration) {
    histogram!("stream_worker_job_duration_seconds", "stream" => stream.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_error(stream: &str, category: ErrorCategory) {
    counter!(
        "stream_worker_job_errors_total",
        "stream" => stream.to_string(),
        "category" => category.as_ref().to_string()
    )
    .increment(1);
}

pub fn record_batch_size(stream: &str, size: usize) {
    histogram!("stream_worker_batch_size", "stream" => stream.to_string()).record(size as f64);
}

pub fn set_in_flight_jobs(stream: &str, count: usize) {
    gauge!("stream_worker_in_flight_jobs", "stream" => stream.to_string()).set(count as f64);
}

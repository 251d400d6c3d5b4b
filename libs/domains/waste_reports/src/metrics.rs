use metrics::{counter, histogram};
use std::time::Duration;

pub(crate) fn record_report_generated() {
    counter!("waste_reports_generated_total").increment(1);
}

pub(crate) fn record_failure(kind: &'static str) {
    counter!("waste_report_failures_total", "kind" => kind).increment(1);
}

pub(crate) fn record_pipeline_duration(elapsed: Duration) {
    histogram!("waste_report_pipeline_duration_seconds").record(elapsed.as_secs_f64());
}

//! Redis stream definitions for report queries.

use stream_worker::StreamDef;

/// Inbound report queries, consumed by the waste-report-worker.
pub struct ReportQueryStream;

impl StreamDef for ReportQueryStream {
    const STREAM_NAME: &'static str = "waste_reports:queries";

    const CONSUMER_GROUP: &'static str = "waste_report_workers";

    const DLQ_STREAM: &'static str = "waste_reports:queries:dlq";
}

/// Outbound responses; consumers are expected to drain it quickly.
pub struct ReportResponseStream;

impl StreamDef for ReportResponseStream {
    const STREAM_NAME: &'static str = "waste_reports:responses";

    const CONSUMER_GROUP: &'static str = "waste_report_consumers";

    const DLQ_STREAM: &'static str = "waste_reports:responses:dlq";

    const MAX_LENGTH: i64 = 10_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_stream_def() {
        assert_eq!(ReportQueryStream::STREAM_NAME, "waste_reports:queries");
        assert_eq!(ReportQueryStream::CONSUMER_GROUP, "waste_report_workers");
        assert_eq!(ReportQueryStream::DLQ_STREAM, "waste_reports:queries:dlq");
        assert_eq!(ReportQueryStream::MAX_LENGTH, 100_000);
    }

    #[test]
    fn test_response_stream_def() {
        assert_eq!(ReportResponseStream::STREAM_NAME, "waste_reports:responses");
        assert_eq!(ReportResponseStream::MAX_LENGTH, 10_000);
    }
}

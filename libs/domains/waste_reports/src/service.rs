//! The report query pipeline.

use std::sync::Arc;
use std::time::Instant;
use strum::{AsRefStr, Display};
use tracing::{debug, info, instrument, warn};

use crate::error::{ReportError, ReportResult};
use crate::events::{QueryEvent, QueryResponse};
use crate::filter::parse_filter;
use crate::metrics;
use crate::models::WasteReport;
use crate::pipeline::build_pipeline;
use crate::projector::project;
use crate::repository::WasteReportRepository;

/// Where a request is in the pipeline. Any failure jumps to `Responding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Parsing,
    BuildingPipeline,
    Executing,
    Projecting,
    Writing,
    Responding,
    Done,
}

fn enter(stage: PipelineStage) {
    debug!(stage = %stage, "Pipeline stage");
}

/// Runs one query event through parse, build, execute, project and write.
pub struct QueryPipeline<R: WasteReportRepository> {
    repository: Arc<R>,
}

impl<R: WasteReportRepository> QueryPipeline<R> {
    pub fn new(repository: R) -> Self {
        Self::with_arc(Arc::new(repository))
    }

    pub fn with_arc(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Always yields a response correlated with `event`.
    #[instrument(
        skip(self, event),
        fields(
            correlation_id = %event.correlation_id,
            aggregate_id = event.aggregate_id,
            event_id = %event.uuid
        )
    )]
    pub async fn run(&self, event: &QueryEvent) -> QueryResponse {
        let start = Instant::now();
        enter(PipelineStage::Received);

        let outcome = self.generate(event).await;

        enter(PipelineStage::Responding);
        let response = match outcome {
            Ok(report) => {
                metrics::record_report_generated();
                info!(
                    report_id = %report.report_id,
                    lines = report.report_result.len(),
                    "Report generated"
                );
                QueryResponse::success(event, &report.report_result)
            }
            Err(e) => {
                metrics::record_failure(e.kind());
                warn!(error_kind = e.kind(), error = %e, "Report query failed");
                QueryResponse::failure(event, &e)
            }
        };

        metrics::record_pipeline_duration(start.elapsed());
        enter(PipelineStage::Done);
        response
    }

    /// Compute and persist the report for `event`.
    pub async fn generate(&self, event: &QueryEvent) -> ReportResult<WasteReport> {
        enter(PipelineStage::Parsing);
        let filter = parse_filter(event.data.as_bytes())?;

        enter(PipelineStage::BuildingPipeline);
        let pipeline = build_pipeline(&filter)?;

        enter(PipelineStage::Executing);
        let groups = self.repository.aggregate_items(pipeline).await?;
        if groups.is_empty() {
            return Err(ReportError::EmptyResultSet {
                gt: filter.gt,
                lt: filter.lt,
            });
        }

        enter(PipelineStage::Projecting);
        let lines = project(&groups)?;

        enter(PipelineStage::Writing);
        let report = WasteReport::new(filter, lines);
        self.repository.insert_report(&report).await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::INTERNAL_ERROR;
    use crate::repository::MockWasteReportRepository;
    use mongodb::bson::doc;

    fn event(data: &str) -> QueryEvent {
        QueryEvent::new(8, "query", "waste-report", data)
    }

    #[tokio::test]
    async fn test_zero_bound_never_touches_the_store() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items().never();
        repo.expect_insert_report().never();

        let pipeline = QueryPipeline::new(repo);
        let event = event(r#"{"timestamp":{"$gt":0,"$lt":21}}"#);
        let response = pipeline.run(&event).await;

        assert!(!response.is_success());
        assert_eq!(response.error_code, Some(INTERNAL_ERROR));
        assert_eq!(response.correlation_id, event.correlation_id);
        assert!(response.error.unwrap().contains("Missing time range"));
    }

    #[tokio::test]
    async fn test_malformed_filter_never_touches_the_store() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items().never();

        let pipeline = QueryPipeline::new(repo);
        let err = pipeline.generate(&event("{not json")).await.unwrap_err();

        assert!(matches!(err, ReportError::MalformedFilter(_)));
    }

    #[tokio::test]
    async fn test_success_persists_and_responds() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items()
            .withf(|pipeline| pipeline.len() == 2)
            .times(1)
            .returning(|_| {
                Ok(vec![doc! {
                    "_id": { "sku": "sku1", "name": "n1" },
                    "avg_waste": 101.0,
                    "avg_total": 120.0,
                }])
            });
        repo.expect_insert_report()
            .withf(|report| {
                report.report_result.len() == 1 && report.search_query.timestamp.gt == 9.0
            })
            .times(1)
            .returning(|_| Ok(()));

        let pipeline = QueryPipeline::new(repo);
        let event = event(r#"{"timestamp":{"$gt":9,"$lt":21}}"#);
        let response = pipeline.run(&event).await;

        assert!(response.is_success());
        assert!(response.error.is_none());
        let lines = response.report_lines().unwrap().unwrap();
        assert_eq!(lines[0].sku, "sku1");
        assert_eq!(lines[0].waste_weight, 101.0);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_persisted() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items().times(1).returning(|_| Ok(vec![]));
        repo.expect_insert_report().never();

        let pipeline = QueryPipeline::new(repo);
        let err = pipeline
            .generate(&event(r#"{"timestamp":{"$gt":9,"$lt":21}}"#))
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::EmptyResultSet { .. }));
    }

    #[tokio::test]
    async fn test_execution_failure_is_reported() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items()
            .returning(|_| Err(ReportError::Execution("server selection timeout".into())));
        repo.expect_insert_report().never();

        let pipeline = QueryPipeline::new(repo);
        let response = pipeline
            .run(&event(r#"{"timestamp":{"$gt":9,"$lt":21}}"#))
            .await;

        assert_eq!(response.error_code, Some(INTERNAL_ERROR));
        assert!(response.error.unwrap().contains("server selection timeout"));
    }

    #[tokio::test]
    async fn test_shape_error_is_not_persisted() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items()
            .returning(|_| Ok(vec![doc! { "_id": "flat", "avg_waste": 1.0, "avg_total": 2.0 }]));
        repo.expect_insert_report().never();

        let pipeline = QueryPipeline::new(repo);
        let err = pipeline
            .generate(&event(r#"{"timestamp":{"$gt":9,"$lt":21}}"#))
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::ShapeAssertion { index: 0, field: "_id", .. }));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported() {
        let mut repo = MockWasteReportRepository::new();
        repo.expect_aggregate_items().returning(|_| {
            Ok(vec![doc! {
                "_id": { "sku": "sku1", "name": "n1" },
                "avg_waste": 1.0,
                "avg_total": 2.0,
            }])
        });
        repo.expect_insert_report()
            .returning(|_| Err(ReportError::Persistence("duplicate key".into())));

        let pipeline = QueryPipeline::new(repo);
        let err = pipeline
            .generate(&event(r#"{"timestamp":{"$gt":9,"$lt":21}}"#))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "persistence");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::BuildingPipeline.to_string(), "building_pipeline");
        assert_eq!(PipelineStage::Done.as_ref(), "done");
    }
}

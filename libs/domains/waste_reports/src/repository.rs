use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::ReportResult;
use crate::models::WasteReport;

/// Store access needed by the query pipeline.
///
/// The aggregation is passed through as built so the in-memory and MongoDB
/// implementations see the same pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WasteReportRepository: Send + Sync {
    /// Run `pipeline` against the item collection.
    ///
    /// Fails with [`crate::ReportError::Execution`].
    async fn aggregate_items(&self, pipeline: Vec<Document>) -> ReportResult<Vec<Document>>;

    /// Insert one report document.
    ///
    /// Fails with [`crate::ReportError::Persistence`].
    async fn insert_report(&self, report: &WasteReport) -> ReportResult<()>;
}

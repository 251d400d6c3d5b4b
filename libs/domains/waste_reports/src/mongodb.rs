use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ReportError, ReportResult};
use crate::models::{WasteItem, WasteReport};
use crate::repository::WasteReportRepository;

const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_millis(5000);

/// MongoDB implementation of [`WasteReportRepository`].
#[derive(Clone)]
pub struct MongoWasteReportRepository {
    items: Collection<Document>,
    reports: Collection<Document>,
    resource_timeout: Duration,
}

impl MongoWasteReportRepository {
    /// # Example
    /// ```ignore
    /// let db = client.database("waste");
    /// let repo = MongoWasteReportRepository::new(&db, "agg_items", "reports");
    /// ```
    pub fn new(db: &Database, item_collection: &str, report_collection: &str) -> Self {
        Self::with_collections(db.collection(item_collection), db.collection(report_collection))
    }

    pub fn with_collections(items: Collection<Document>, reports: Collection<Document>) -> Self {
        Self {
            items,
            reports,
            resource_timeout: DEFAULT_RESOURCE_TIMEOUT,
        }
    }

    /// Upper bound for a single aggregate or insert.
    pub fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    /// Create `reportID_index` (unique) and `itemID_wasteID_index`.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let report_index = IndexModel::builder()
            .keys(doc! { "reportID": 1 })
            .options(
                IndexOptions::builder()
                    .name("reportID_index".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.reports.create_index(report_index).await?;

        let item_index = IndexModel::builder()
            .keys(doc! { "itemID": 1, "wasteID": 1 })
            .options(
                IndexOptions::builder()
                    .name("itemID_wasteID_index".to_string())
                    .build(),
            )
            .build();
        self.items.create_index(item_index).await?;

        debug!(
            items = %self.items.name(),
            reports = %self.reports.name(),
            "Indexes ensured"
        );
        Ok(())
    }

    /// Bulk insert into the item collection; returns the number inserted.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn insert_items(&self, items: &[WasteItem]) -> ReportResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let documents = items
            .iter()
            .map(mongodb::bson::to_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ReportError::Persistence(e.to_string()))?;

        let result = bounded(self.resource_timeout, async { self.items.insert_many(documents).await })
            .await
            .map_err(ReportError::Persistence)?;

        Ok(result.inserted_ids.len())
    }
}

/// Map a driver error or an elapsed deadline to a message.
async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T, String>
where
    F: Future<Output = Result<T, mongodb::error::Error>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
    }
}

#[async_trait]
impl WasteReportRepository for MongoWasteReportRepository {
    #[instrument(skip(self, pipeline), fields(collection = %self.items.name()))]
    async fn aggregate_items(&self, pipeline: Vec<Document>) -> ReportResult<Vec<Document>> {
        let run = async {
            let cursor = self.items.aggregate(pipeline).await?;
            cursor.try_collect::<Vec<Document>>().await
        };

        let groups = bounded(self.resource_timeout, run)
            .await
            .map_err(ReportError::Execution)?;

        debug!(groups = groups.len(), "Aggregation finished");
        Ok(groups)
    }

    #[instrument(skip(self, report), fields(collection = %self.reports.name(), report_id = %report.report_id))]
    async fn insert_report(&self, report: &WasteReport) -> ReportResult<()> {
        bounded(
            self.resource_timeout,
            async { self.reports.insert_one(report.to_document()).await },
        )
        .await
        .map_err(ReportError::Persistence)?;

        Ok(())
    }
}

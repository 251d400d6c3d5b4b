//! Stream processor for report queries.
//!
//! Every query produces exactly one response on the response stream. A
//! failed publish is permanent: re-running the query would persist a second
//! report, so the entry goes to the DLQ instead.

use async_trait::async_trait;
use stream_worker::{StreamError, StreamProcessor};
use tracing::{debug, error};

use crate::events::QueryEvent;
use crate::repository::WasteReportRepository;
use crate::service::QueryPipeline;
use crate::sink::ResponseSink;

pub struct ReportQueryProcessor<R: WasteReportRepository, S: ResponseSink> {
    pipeline: QueryPipeline<R>,
    sink: S,
}

impl<R: WasteReportRepository, S: ResponseSink> ReportQueryProcessor<R, S> {
    pub fn new(pipeline: QueryPipeline<R>, sink: S) -> Self {
        Self { pipeline, sink }
    }
}

#[async_trait]
impl<R, S> StreamProcessor<QueryEvent> for ReportQueryProcessor<R, S>
where
    R: WasteReportRepository + 'static,
    S: ResponseSink + 'static,
{
    async fn process(&self, event: &QueryEvent) -> Result<(), StreamError> {
        let response = self.pipeline.run(event).await;

        match self.sink.publish(&response).await {
            Ok(entry_id) => {
                debug!(
                    correlation_id = %event.correlation_id,
                    stream_id = %entry_id,
                    success = response.is_success(),
                    "Published query response"
                );
                Ok(())
            }
            Err(e) => {
                error!(correlation_id = %event.correlation_id, error = %e, "Failed to publish query response");
                Err(StreamError::permanent(format!(
                    "publish response for {}: {e}",
                    event.correlation_id
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "waste_report_query"
    }
}

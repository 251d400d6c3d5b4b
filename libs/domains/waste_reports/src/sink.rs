use async_trait::async_trait;
use stream_worker::{StreamError, StreamProducer};

use crate::events::QueryResponse;

/// Destination for response events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Publish one response, returning the entry id.
    async fn publish(&self, response: &QueryResponse) -> Result<String, StreamError>;
}

#[async_trait]
impl ResponseSink for StreamProducer {
    async fn publish(&self, response: &QueryResponse) -> Result<String, StreamError> {
        self.send(response).await
    }
}

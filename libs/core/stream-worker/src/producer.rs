//! Stream producer
//!
//! ```rust,ignore
//! let producer = StreamProducer::from_stream_def::<ReportResponseStream>(redis);
//! let entry_id = producer.send(&response).await?;
//! ```

use crate::error::StreamError;
use crate::registry::{MessageKey, StreamDef};
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::debug;

/// Appends JSON payloads to one stream with approximate trimming.
#[derive(Clone)]
pub struct StreamProducer {
    redis: ConnectionManager,
    stream_name: String,
    max_length: i64,
}

impl StreamProducer {
    pub fn new(redis: ConnectionManager, stream_name: impl Into<String>) -> Self {
        Self {
            redis,
            stream_name: stream_name.into(),
            max_length: 100_000,
        }
    }

    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self {
            redis,
            stream_name: S::STREAM_NAME.to_string(),
            max_length: S::MAX_LENGTH,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// XADD MAXLEN ~ with the payload in the `job` field.
    ///
    /// Returns the entry ID.
    pub async fn send<J: Serialize + Sync>(&self, job: &J) -> Result<String, StreamError> {
        let mut conn = self.redis.clone();
        let payload = serde_json::to_string(job)?;

        let entry_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(MessageKey::Job.as_ref())
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        debug!(stream = %self.stream_name, stream_id = %entry_id, "Published message");
        Ok(entry_id)
    }
}

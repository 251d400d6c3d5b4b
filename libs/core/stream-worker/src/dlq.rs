//! Dead letter stream for jobs that cannot be completed

use crate::error::StreamError;
use crate::registry::{MessageKey, StreamJob};
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

type StreamEntries = Vec<(String, Vec<(String, String)>)>;

#[derive(Clone)]
pub struct DlqManager {
    redis: ConnectionManager,
    dlq_stream: String,
    max_length: i64,
}

impl DlqManager {
    pub fn new(redis: ConnectionManager, dlq_stream: impl Into<String>) -> Self {
        Self {
            redis,
            dlq_stream: dlq_stream.into(),
            max_length: 10_000,
        }
    }

    pub fn dlq_stream(&self) -> &str {
        &self.dlq_stream
    }

    /// Dead-letter a decoded job.
    pub async fn move_to_dlq<J: StreamJob>(
        &self,
        job: &J,
        reason: &str,
        original_stream_id: &str,
    ) -> Result<String, StreamError> {
        let entry = DlqEntry {
            job_id: Some(job.job_id()),
            job_data: serde_json::to_value(job)?,
            error: reason.to_string(),
            original_stream_id: original_stream_id.to_string(),
            retry_count: job.retry_count(),
            failed_at: Utc::now(),
        };

        let dlq_id = self.append(&entry).await?;
        warn!(
            job_id = %job.job_id(),
            dlq_id = %dlq_id,
            error = %reason,
            retry_count = job.retry_count(),
            "Moved job to DLQ"
        );
        Ok(dlq_id)
    }

    /// Dead-letter an entry whose payload never decoded; the raw text is kept as a JSON string.
    pub async fn move_raw_to_dlq(
        &self,
        raw: Option<&str>,
        reason: &str,
        original_stream_id: &str,
    ) -> Result<String, StreamError> {
        let entry = DlqEntry {
            job_id: None,
            job_data: raw.map(serde_json::Value::from).unwrap_or_default(),
            error: reason.to_string(),
            original_stream_id: original_stream_id.to_string(),
            retry_count: 0,
            failed_at: Utc::now(),
        };

        let dlq_id = self.append(&entry).await?;
        error!(dlq_id = %dlq_id, stream_id = %original_stream_id, error = %reason, "Moved undecodable message to DLQ");
        Ok(dlq_id)
    }

    async fn append(&self, entry: &DlqEntry) -> Result<String, StreamError> {
        let data = serde_json::to_string(entry)?;
        let mut conn = self.redis.clone();

        let dlq_id: String = redis::cmd("XADD")
            .arg(&self.dlq_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(MessageKey::Data.as_ref())
            .arg(&data)
            .query_async(&mut conn)
            .await?;

        Ok(dlq_id)
    }

    pub async fn stats(&self) -> Result<DlqStats, StreamError> {
        let mut conn = self.redis.clone();

        let length: i64 = conn.xlen(&self.dlq_stream).await?;
        let newest: StreamEntries = redis::cmd("XREVRANGE")
            .arg(&self.dlq_stream)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await?;

        Ok(DlqStats {
            stream_name: self.dlq_stream.clone(),
            length,
            newest_entry_id: newest.into_iter().next().map(|(id, _)| id),
        })
    }

    /// Oldest entries first.
    pub async fn list(&self, count: usize) -> Result<Vec<DlqEntry>, StreamError> {
        let mut conn = self.redis.clone();

        let entries: StreamEntries = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|(_, fields)| {
                fields
                    .into_iter()
                    .find(|(k, _)| k == MessageKey::Data.as_ref())
                    .and_then(|(_, v)| serde_json::from_str(&v).ok())
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Absent when the payload never decoded
    pub job_id: Option<String>,

    pub job_data: serde_json::Value,

    pub error: String,

    pub original_stream_id: String,

    pub retry_count: u32,

    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqStats {
    pub stream_name: String,
    pub length: i64,
    pub newest_entry_id: Option<String>,
}

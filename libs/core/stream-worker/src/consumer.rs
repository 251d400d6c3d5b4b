//! Consumer-group reads and acknowledgements

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::registry::{MessageKey, StreamJob};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use serde::Serialize;
use tracing::{debug, info, warn};

type StreamEntries = Vec<(String, Vec<(String, String)>)>;
type ReadReply = Vec<(String, StreamEntries)>;

/// One entry read from the stream.
#[derive(Debug, Clone)]
pub enum Delivery<J> {
    Job {
        /// Redis entry ID, e.g. "1718000000000-0"
        id: String,
        job: J,
    },
    /// The `job` field is missing or does not decode as `J`.
    Malformed {
        id: String,
        raw: Option<String>,
        error: String,
    },
}

impl<J> Delivery<J> {
    pub fn id(&self) -> &str {
        match self {
            Delivery::Job { id, .. } | Delivery::Malformed { id, .. } => id,
        }
    }
}

/// Reads one stream through one consumer group.
#[derive(Clone)]
pub struct StreamConsumer {
    redis: ConnectionManager,
    config: WorkerConfig,
}

impl StreamConsumer {
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        Self { redis, config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// XGROUP CREATE ... MKSTREAM; an existing group is fine.
    pub async fn ensure_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Entries delivered to this consumer but never acknowledged.
    pub async fn read_pending<J: StreamJob>(&self) -> Result<Vec<Delivery<J>>, StreamError> {
        let mut conn = self.redis.clone();

        let reply: Option<ReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg("0")
            .query_async(&mut conn)
            .await?;

        Ok(self.decode_reply(reply))
    }

    /// New entries, blocking up to `block_timeout_ms`.
    pub async fn read_new<J: StreamJob>(&self) -> Result<Vec<Delivery<J>>, StreamError> {
        let mut conn = self.redis.clone();

        let reply: Option<ReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("BLOCK")
            .arg(self.config.block_timeout_ms)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        Ok(self.decode_reply(reply))
    }

    /// Take over entries other consumers left idle longer than `claim_idle_ms`.
    pub async fn claim_abandoned<J: StreamJob>(&self) -> Result<Vec<Delivery<J>>, StreamError> {
        let mut conn = self.redis.clone();

        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(self.config.claim_idle_ms)
            .arg("-")
            .arg("+")
            .arg(self.config.batch_size)
            .query_async(&mut conn)
            .await?;

        let ids: Vec<&str> = pending
            .iter()
            .filter(|(_, owner, _, _)| owner != &self.config.consumer_id)
            .map(|(id, _, _, _)| id.as_str())
            .collect();

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg(self.config.claim_idle_ms)
            .arg(&ids);

        let entries: StreamEntries = cmd.query_async(&mut conn).await?;
        let claimed = decode_entries(entries);

        if !claimed.is_empty() {
            warn!(count = claimed.len(), "Claimed abandoned messages");
        }
        Ok(claimed)
    }

    pub async fn ack(&self, entry_id: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let _: i64 = conn
            .xack(&self.config.stream_name, &self.config.consumer_group, &[entry_id])
            .await?;

        debug!(entry_id = %entry_id, "Acknowledged message");
        Ok(())
    }

    /// Append a job to the tail of the consumed stream.
    pub async fn requeue<J: Serialize>(&self, job: &J) -> Result<String, StreamError> {
        let mut conn = self.redis.clone();
        let payload = serde_json::to_string(job)?;

        let id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.max_length)
            .arg("*")
            .arg(MessageKey::Job.as_ref())
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        Ok(id)
    }

    /// Length and group backlog of the consumed stream.
    pub async fn stream_info(&self) -> Result<StreamInfo, StreamError> {
        let mut conn = self.redis.clone();

        let length: i64 = conn.xlen(&self.config.stream_name).await?;

        let summary: RedisResult<(i64, Option<String>, Option<String>, Option<Vec<(String, String)>>)> =
            redis::cmd("XPENDING")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .query_async(&mut conn)
                .await;

        Ok(StreamInfo {
            stream_name: self.config.stream_name.clone(),
            consumer_group: self.config.consumer_group.clone(),
            length,
            pending_count: summary.map(|(count, ..)| count).unwrap_or(0),
        })
    }

    fn decode_reply<J: StreamJob>(&self, reply: Option<ReadReply>) -> Vec<Delivery<J>> {
        reply
            .unwrap_or_default()
            .into_iter()
            .flat_map(|(_stream, entries)| decode_entries(entries))
            .collect()
    }
}

fn decode_entries<J: StreamJob>(entries: StreamEntries) -> Vec<Delivery<J>> {
    entries
        .into_iter()
        .map(|(id, fields)| {
            let raw = fields
                .into_iter()
                .find(|(k, _)| k == MessageKey::Job.as_ref())
                .map(|(_, v)| v);

            let decoded = match &raw {
                Some(payload) => serde_json::from_str::<J>(payload).map_err(|e| e.to_string()),
                None => Err("missing 'job' field".to_string()),
            };

            match decoded {
                Ok(job) => Delivery::Job { id, job },
                Err(error) => {
                    warn!(stream_id = %id, error = %error, "Undecodable stream entry");
                    Delivery::Malformed { id, raw, error }
                }
            }
        })
        .collect()
}

/// Stream backlog snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub stream_name: String,
    pub consumer_group: String,
    pub length: i64,
    pub pending_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
        #[serde(default)]
        retry_count: u32,
    }

    impl StreamJob for Ping {
        fn job_id(&self) -> String {
            self.n.to_string()
        }
        fn retry_count(&self) -> u32 {
            self.retry_count
        }
        fn with_retry(&self) -> Self {
            Self {
                retry_count: self.retry_count + 1,
                ..self.clone()
            }
        }
    }

    fn entry(id: &str, fields: &[(&str, &str)]) -> (String, Vec<(String, String)>) {
        (
            id.to_string(),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_decode_entries_keeps_order_and_flags_malformed() {
        let decoded: Vec<Delivery<Ping>> = decode_entries(vec![
            entry("1-0", &[("job", r#"{"n":1}"#)]),
            entry("2-0", &[("job", "not json")]),
            entry("3-0", &[("other", "x")]),
            entry("4-0", &[("trace", "t"), ("job", r#"{"n":4,"retry_count":2}"#)]),
        ]);

        let ids: Vec<&str> = decoded.iter().map(Delivery::id).collect();
        assert_eq!(ids, vec!["1-0", "2-0", "3-0", "4-0"]);

        assert!(matches!(&decoded[0], Delivery::Job { job, .. } if job.n == 1));
        assert!(matches!(&decoded[1], Delivery::Malformed { raw: Some(r), .. } if r == "not json"));
        assert!(matches!(&decoded[2], Delivery::Malformed { raw: None, .. }));
        assert!(matches!(&decoded[3], Delivery::Job { job, .. } if job.retry_count == 2));
    }
}

//! Worker configuration

use crate::registry::StreamDef;
use uuid::Uuid;

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub stream_name: String,

    pub consumer_group: String,

    /// Unique consumer name inside the group
    pub consumer_id: String,

    /// Dead letter stream for jobs that exhausted their retries
    pub dlq_stream: String,

    /// Approximate MAXLEN applied when requeueing
    pub max_length: i64,

    /// Entries fetched per XREADGROUP
    pub batch_size: usize,

    /// XREADGROUP BLOCK timeout in milliseconds
    pub block_timeout_ms: u64,

    /// Upper bound on jobs processed at the same time
    pub max_concurrent_jobs: usize,

    /// Idle time after which another consumer's pending entry is claimed
    pub claim_idle_ms: u64,
}

impl WorkerConfig {
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            dlq_stream: S::DLQ_STREAM.to_string(),
            max_length: S::MAX_LENGTH,
            ..Self::new(S::STREAM_NAME, S::CONSUMER_GROUP)
        }
    }

    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        let stream_name = stream_name.into();
        Self {
            dlq_stream: format!("{stream_name}:dlq"),
            stream_name,
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            max_length: 100_000,
            batch_size: 10,
            block_timeout_ms: 5000,
            max_concurrent_jobs: 1,
            claim_idle_ms: 60_000,
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_block_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    /// Zero is bumped to one.
    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;

    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test:stream";
        const CONSUMER_GROUP: &'static str = "test_group";
        const DLQ_STREAM: &'static str = "test:stream:dead";
        const MAX_LENGTH: i64 = 500;
    }

    #[test]
    fn test_from_stream_def() {
        let config = WorkerConfig::from_stream_def::<TestStream>();

        assert_eq!(config.stream_name, "test:stream");
        assert_eq!(config.consumer_group, "test_group");
        assert_eq!(config.dlq_stream, "test:stream:dead");
        assert_eq!(config.max_length, 500);
        assert!(config.consumer_id.starts_with("worker-"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("my:stream", "my_group")
            .with_consumer_id("worker-1")
            .with_batch_size(20)
            .with_max_concurrent_jobs(0)
            .with_block_timeout_ms(250);

        assert_eq!(config.dlq_stream, "my:stream:dlq");
        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.block_timeout_ms, 250);
    }
}

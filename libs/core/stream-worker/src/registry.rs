//! Stream definitions and the job/processor contracts.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use strum::{AsRefStr, Display};

use crate::error::StreamError;

/// Field names used in stream entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    /// JSON encoded job payload
    Job,
    /// JSON encoded [`crate::DlqEntry`]
    Data,
}

/// Static description of a stream and its consumer group.
///
/// ```rust,ignore
/// pub struct ReportQueryStream;
///
/// impl StreamDef for ReportQueryStream {
///     const STREAM_NAME: &'static str = "reports:queries";
///     const CONSUMER_GROUP: &'static str = "report_workers";
///     const DLQ_STREAM: &'static str = "reports:queries:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    const STREAM_NAME: &'static str;

    const CONSUMER_GROUP: &'static str;

    const DLQ_STREAM: &'static str;

    /// Approximate MAXLEN used when producing.
    const MAX_LENGTH: i64 = 100_000;
}

/// A payload carried in the `job` field of a stream entry.
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Identifier used in logs and DLQ entries.
    fn job_id(&self) -> String;

    fn retry_count(&self) -> u32;

    /// Copy of the job with the retry count incremented.
    fn with_retry(&self) -> Self;
}

/// Handles one job at a time; the worker owns ack, retry and DLQ handling.
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    fn name(&self) -> &'static str;
}

//! Stream Worker Framework
//!
//! Consumes a Redis stream through a consumer group and hands each job to a
//! [`StreamProcessor`].
//!
//! - **Bounded concurrency**: at most `max_concurrent_jobs` jobs in flight
//! - **Consumer groups**: horizontal scaling, recovery of unacknowledged entries
//! - **Dead Letter Queue**: permanent failures and exhausted retries
//! - **Prometheus metrics** and **health endpoints**
//!
//! ```ignore
//! let config = WorkerConfig::from_stream_def::<MyStream>().with_max_concurrent_jobs(8);
//! let worker = StreamWorker::new(redis, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod dlq;
mod error;
mod health;
pub mod metrics;
mod producer;
mod registry;
mod worker;

pub use config::WorkerConfig;
pub use consumer::{Delivery, StreamConsumer, StreamInfo};
pub use dlq::{DlqEntry, DlqManager, DlqStats};
pub use error::{ErrorCategory, StreamError};
pub use health::{HealthState, ReadinessProbe, ReadinessReport, RedisProbe, evaluate_probes, health_router};
pub use metrics::init_metrics;
pub use producer::StreamProducer;
pub use registry::{MessageKey, StreamDef, StreamJob, StreamProcessor};
pub use worker::StreamWorker;

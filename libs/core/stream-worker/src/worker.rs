//! Generic stream worker with bounded concurrency.

use crate::config::WorkerConfig;
use crate::consumer::{Delivery, StreamConsumer};
use crate::dlq::DlqManager;
use crate::error::StreamError;
use crate::metrics::{self, JobStatus};
use crate::registry::{StreamJob, StreamProcessor};
use redis::aio::ConnectionManager;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

const MAX_BACKOFF_SECS: u64 = 30;

/// Runs a [`StreamProcessor`] over a Redis stream consumer group.
///
/// Each batch is fanned out to at most `max_concurrent_jobs` tasks. A job is
/// acknowledged once it succeeded, was requeued for retry, or was
/// dead-lettered. Shutdown is checked between batches, so a batch that was
/// already read always runs to completion.
pub struct StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    consumer: StreamConsumer,
    dlq: DlqManager,
    processor: Arc<P>,
    config: WorkerConfig,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    _phantom: PhantomData<J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: StreamJob + 'static,
    P: StreamProcessor<J> + 'static,
{
    pub fn new(redis: ConnectionManager, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(redis, Arc::new(processor), config)
    }

    pub fn with_arc_processor(
        redis: ConnectionManager,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            consumer: StreamConsumer::new(redis.clone(), config.clone()),
            dlq: DlqManager::new(redis, config.dlq_stream.clone()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            processor,
            config,
            _phantom: PhantomData,
        }
    }

    pub fn consumer(&self) -> &StreamConsumer {
        &self.consumer
    }

    /// Read and process until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            batch_size = self.config.batch_size,
            "Starting stream worker"
        );

        self.consumer.ensure_consumer_group().await?;

        match self.consumer.read_pending::<J>().await {
            Ok(pending) if !pending.is_empty() => {
                info!(count = pending.len(), "Recovering unacknowledged messages");
                self.dispatch(pending).await;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read pending messages on startup"),
        }

        let claim_interval = Duration::from_millis(self.config.claim_idle_ms.max(1000));
        let mut last_claim = Instant::now();
        let mut consecutive_errors: u32 = 0;

        while !*shutdown.borrow() {
            match self.consumer.read_new::<J>().await {
                Ok(batch) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Stream connection recovered");
                        consecutive_errors = 0;
                    }
                    if !batch.is_empty() {
                        self.dispatch(batch).await;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let backoff = self.read_error_backoff(&e, consecutive_errors).await;

                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
            }

            if last_claim.elapsed() >= claim_interval {
                match self.consumer.claim_abandoned::<J>().await {
                    Ok(claimed) if !claimed.is_empty() => self.dispatch(claimed).await,
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Error claiming abandoned messages"),
                }
                last_claim = Instant::now();
            }
        }

        info!(processor = %self.processor.name(), "Stream worker stopped");
        Ok(())
    }

    async fn read_error_backoff(&self, e: &StreamError, consecutive_errors: u32) -> Duration {
        if e.is_nogroup() {
            warn!("Consumer group missing, recreating");
            if let Err(create_err) = self.consumer.ensure_consumer_group().await {
                error!(error = %create_err, "Failed to recreate consumer group");
            }
            return Duration::from_millis(100);
        }

        let secs = 2u64.pow(consecutive_errors.min(5)).min(MAX_BACKOFF_SECS);
        if e.is_connection_error() {
            warn!(error = %e, consecutive_errors, backoff_secs = secs, "Redis connection error, backing off");
        } else {
            error!(error = %e, consecutive_errors, backoff_secs = secs, "Failed to read stream");
        }
        Duration::from_secs(secs)
    }

    /// Process one batch, waiting for every job before returning.
    async fn dispatch(&self, batch: Vec<Delivery<J>>) {
        metrics::record_batch_size(&self.config.stream_name, batch.len());

        run_bounded(&self.permits, batch, |delivery| {
            let job = JobContext {
                consumer: self.consumer.clone(),
                dlq: self.dlq.clone(),
                processor: Arc::clone(&self.processor),
                in_flight: Arc::clone(&self.in_flight),
            };
            async move { job.handle(delivery).await }
        })
        .await;
    }
}

/// Spawn `handle(item)` for every item, holding one permit per running task,
/// and wait for all of them. Stops spawning if the semaphore is closed.
async fn run_bounded<T, F, Fut>(permits: &Arc<Semaphore>, items: Vec<T>, handle: F)
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut tasks = JoinSet::new();

    for item in items {
        let permit = match Arc::clone(permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let task = handle(item);

        tasks.spawn(async move {
            let _permit = permit;
            task.await;
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Job task panicked");
        }
    }
}

/// Everything a spawned job task needs.
struct JobContext<P> {
    consumer: StreamConsumer,
    dlq: DlqManager,
    processor: Arc<P>,
    in_flight: Arc<AtomicUsize>,
}

impl<P> JobContext<P> {
    fn stream(&self) -> &str {
        &self.consumer.config().stream_name
    }

    async fn handle<J>(&self, delivery: Delivery<J>)
    where
        J: StreamJob,
        P: StreamProcessor<J>,
    {
        match delivery {
            Delivery::Job { id, job } => {
                let span = info_span!("job", stream_id = %id, job_id = %job.job_id());
                self.run_job(&id, &job).instrument(span).await;
            }
            Delivery::Malformed { id, raw, error } => {
                metrics::record_job_processed(self.stream(), JobStatus::Malformed);
                if let Err(e) = self.dlq.move_raw_to_dlq(raw.as_deref(), &error, &id).await {
                    error!(stream_id = %id, error = %e, "Failed to dead-letter malformed message");
                }
                self.ack(&id).await;
            }
        }
    }

    async fn run_job<J>(&self, id: &str, job: &J)
    where
        J: StreamJob,
        P: StreamProcessor<J>,
    {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_in_flight_jobs(self.stream(), current);

        let start = Instant::now();
        let result = self.processor.process(job).await;
        metrics::record_job_duration(self.stream(), start.elapsed());

        let current = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_in_flight_jobs(self.stream(), current);

        match result {
            Ok(()) => {
                metrics::record_job_processed(self.stream(), JobStatus::Success);
                self.ack(id).await;
            }
            Err(e) => {
                metrics::record_error(self.stream(), e.category());
                warn!(error = %e, error_category = ?e.category(), retry_count = job.retry_count(), "Job processing failed");

                if let Err(handler_err) = self.retry_or_dead_letter(id, job, &e).await {
                    error!(error = %handler_err, "Failed to handle job error");
                }
                self.ack(id).await;
            }
        }
    }

    async fn retry_or_dead_letter<J>(&self, id: &str, job: &J, e: &StreamError) -> Result<(), StreamError>
    where
        J: StreamJob,
    {
        if e.should_retry(job.retry_count()) {
            let delay = e.backoff_delay_ms(job.retry_count());
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.consumer.requeue(&job.with_retry()).await?;
            metrics::record_job_processed(self.stream(), JobStatus::Retried);
        } else {
            self.dlq.move_to_dlq(job, &e.to_string(), id).await?;
            metrics::record_job_processed(self.stream(), JobStatus::Dlq);
        }
        Ok(())
    }

    async fn ack(&self, id: &str) {
        if let Err(e) = self.consumer.ack(id).await {
            error!(stream_id = %id, error = %e, "Failed to ACK message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tracker {
        active: AtomicUsize,
        peak: AtomicUsize,
        done: AtomicUsize,
    }

    async fn run_tracked(limit: usize, count: usize) -> Arc<Tracker> {
        let permits = Arc::new(Semaphore::new(limit));
        let tracker = Arc::new(Tracker::default());

        run_bounded(&permits, (0..count).collect(), |_item: usize| {
            let tracker = Arc::clone(&tracker);
            async move {
                let now = tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                tracker.active.fetch_sub(1, Ordering::SeqCst);
                tracker.done.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        tracker
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_bounded_caps_parallel_tasks() {
        let tracker = run_tracked(4, 12).await;

        assert_eq!(tracker.done.load(Ordering::SeqCst), 12);
        assert_eq!(tracker.active.load(Ordering::SeqCst), 0);
        let peak = tracker.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak {peak} exceeded the limit");
        assert!(peak > 1, "tasks never overlapped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_bounded_single_permit_is_sequential() {
        let tracker = run_tracked(1, 5).await;

        assert_eq!(tracker.done.load(Ordering::SeqCst), 5);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_bounded_closed_semaphore_spawns_nothing() {
        let permits = Arc::new(Semaphore::new(2));
        permits.close();
        let done = Arc::new(AtomicUsize::new(0));

        run_bounded(&permits, vec![1, 2, 3], |_item: i32| {
            let done = Arc::clone(&done);
            async move {
                done.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(done.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_bounded_survives_panicking_task() {
        let permits = Arc::new(Semaphore::new(2));
        let done = Arc::new(AtomicUsize::new(0));

        run_bounded(&permits, vec![0, 1, 2], |item: i32| {
            let done = Arc::clone(&done);
            async move {
                if item == 1 {
                    panic!("boom");
                }
                done.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(permits.available_permits(), 2);
    }
}

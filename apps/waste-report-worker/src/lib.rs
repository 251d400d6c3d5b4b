//! Waste Report Worker
//!
//! Consumes report queries from a Redis stream, runs each through the
//! report pipeline and publishes exactly one response per query.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (waste_reports:queries)
//!   ↓ (Consumer Group: waste_report_workers)
//! StreamWorker<QueryEvent, ReportQueryProcessor>
//!   ↓ (parse → aggregate → project → persist)
//! QueryPipeline<MongoWasteReportRepository>
//!   ↓
//! MongoDB (item + report collections)
//!   ↓
//! Redis Stream (waste_reports:responses)
//! ```

pub mod config;
pub mod probes;

use axum::Router;
use core_config::{Environment, FromEnv, app_info, server::ServerConfig};
use database::{
    mongodb::{MongoConfig, connect_from_config_with_retry},
    redis::{RedisConfig, connect_with_retry},
};
use domain_waste_reports::{
    MongoWasteReportRepository, QueryEvent, QueryPipeline, ReportQueryProcessor,
    ReportQueryStream, ReportResponseStream, seed,
};
use eyre::{Result, WrapErr};
use stream_worker::{HealthState, StreamProducer, StreamWorker, WorkerConfig, health_router};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::WorkerSettings;
use crate::probes::MongoProbe;

/// Serve health, readiness, stream info and metrics until shutdown.
async fn start_health_server(
    state: HealthState,
    server: ServerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app: Router = health_router(state);

    let addr = server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {addr}"))?;

    info!(address = %addr, "Health server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Insert synthetic items when `SEED_WASTE_ITEMS` is set outside production.
async fn seed_items(
    repository: &MongoWasteReportRepository,
    count: usize,
    environment: &Environment,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    if environment.is_production() {
        warn!(count, "SEED_WASTE_ITEMS is ignored in production");
        return Ok(());
    }

    let inserted = repository
        .insert_items(&seed::random_waste_items(count))
        .await
        .wrap_err("Failed to seed waste items")?;
    info!(inserted, "Seeded synthetic waste items");
    Ok(())
}

/// Run the worker until SIGINT/SIGTERM.
///
/// # Errors
///
/// Fails on invalid configuration, when MongoDB or Redis stay unreachable
/// after retries, when index creation fails, or when the stream worker stops
/// with a fatal error.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    stream_worker::init_metrics().wrap_err("Failed to install metrics recorder")?;

    let app_info = app_info!();
    info!(
        name = %app_info.name,
        version = %app_info.version,
        environment = ?environment,
        "Starting waste report worker"
    );

    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker settings")?;
    let server = ServerConfig::from_env().wrap_err("Failed to load health server configuration")?;

    let mut mongo_config = MongoConfig::from_env().wrap_err("Failed to load MongoDB configuration")?;
    if mongo_config.app_name.is_none() {
        mongo_config = mongo_config.with_app_name(settings.service_name.clone());
    }

    info!(database = %mongo_config.database(), "Connecting to MongoDB...");
    let client = connect_from_config_with_retry(&mongo_config, None)
        .await
        .wrap_err("Failed to connect to MongoDB")?;
    let db = client.database(mongo_config.database());

    let repository = MongoWasteReportRepository::new(
        &db,
        &settings.item_collection,
        &settings.report_collection,
    )
    .with_resource_timeout(mongo_config.resource_timeout());
    repository
        .ensure_indexes()
        .await
        .wrap_err("Failed to create MongoDB indexes")?;
    seed_items(&repository, settings.seed_items, &environment).await?;

    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    info!("Connecting to Redis...");
    let redis = connect_with_retry(&redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;

    let worker_config = WorkerConfig::from_stream_def::<ReportQueryStream>()
        .with_block_timeout_ms(settings.block_ms)
        .with_batch_size(settings.batch_size)
        .with_max_concurrent_jobs(settings.max_concurrent_jobs);
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        batch_size = worker_config.batch_size,
        max_concurrent_jobs = worker_config.max_concurrent_jobs,
        item_collection = %settings.item_collection,
        report_collection = %settings.report_collection,
        "Worker configuration loaded"
    );

    let responses = StreamProducer::from_stream_def::<ReportResponseStream>(redis.clone());
    let processor = ReportQueryProcessor::new(QueryPipeline::new(repository), responses);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(
        redis.clone(),
        &worker_config,
        settings.service_name.clone(),
        app_info.version,
    )
    .with_probe(MongoProbe::new(client, mongo_config.database()));

    let health_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, server, health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    });

    let worker = StreamWorker::<QueryEvent, _>::new(redis, processor, worker_config);
    worker
        .run(shutdown_rx)
        .await
        .wrap_err("Stream worker failed")?;

    info!("Waste report worker stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
    }
}

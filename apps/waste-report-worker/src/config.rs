use core_config::{ConfigError, FromEnv, env_parse_or, env_required};

/// Worker settings not covered by the connector configs.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    /// Collection the aggregation runs over
    pub item_collection: String,
    /// Collection generated reports are written to
    pub report_collection: String,
    pub max_concurrent_jobs: usize,
    pub batch_size: usize,
    /// XREADGROUP BLOCK timeout
    pub block_ms: u64,
    pub service_name: String,
    /// Synthetic items to insert at startup, development only
    pub seed_items: usize,
}

impl FromEnv for WorkerSettings {
    /// - MONGO_AGG_COLLECTION, MONGO_REPORT_COLLECTION: required
    /// - WORKER_MAX_CONCURRENT_JOBS (16), WORKER_BATCH_SIZE (50), WORKER_BLOCK_MS (1000)
    /// - SERVICE_NAME: defaults to the package name
    /// - SEED_WASTE_ITEMS (0)
    fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            item_collection: env_required("MONGO_AGG_COLLECTION")?,
            report_collection: env_required("MONGO_REPORT_COLLECTION")?,
            max_concurrent_jobs: env_parse_or("WORKER_MAX_CONCURRENT_JOBS", 16)?,
            batch_size: env_parse_or("WORKER_BATCH_SIZE", 50)?,
            block_ms: env_parse_or("WORKER_BLOCK_MS", 1000)?,
            service_name: core_config::env_optional("SERVICE_NAME")
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            seed_items: env_parse_or("SEED_WASTE_ITEMS", 0)?,
        };

        for (key, value) in [
            ("WORKER_MAX_CONCURRENT_JOBS", settings.max_concurrent_jobs),
            ("WORKER_BATCH_SIZE", settings.batch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::ParseError {
                    key: key.to_string(),
                    details: "must be at least 1".to_string(),
                });
            }
        }

        Ok(settings)
    }
}

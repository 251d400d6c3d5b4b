use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::RedisConfig;
use crate::common::{RetryConfig, retry, retry_with_backoff};

/// Open a reconnecting connection manager and verify it with PING.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// Connect with exponential backoff; `None` uses [`RetryConfig::default`].
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    match retry_config {
        Some(policy) => retry_with_backoff(|| connect(config.url()), policy).await,
        None => retry(|| connect(config.url())).await,
    }
}

/// PING the server; any reply other than PONG counts as unhealthy.
pub async fn check_health(conn: &ConnectionManager) -> bool {
    let mut conn = conn.clone();
    matches!(
        redis::cmd("PING").query_async::<String>(&mut conn).await,
        Ok(reply) if reply == "PONG"
    )
}

use mongodb::{Client, bson::doc};
use std::time::Instant;

/// Outcome of a MongoDB ping
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Driver error, when unhealthy
    pub message: Option<String>,
    pub response_time_ms: u64,
}

/// Run `ping` against `database`.
pub async fn check_health(client: &Client, database: &str) -> bool {
    check_health_detailed(client, database).await.healthy
}

/// Run `ping` against `database`, reporting latency and the error text.
pub async fn check_health_detailed(client: &Client, database: &str) -> HealthStatus {
    let start = Instant::now();
    let result = client.database(database).run_command(doc! { "ping": 1 }).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}

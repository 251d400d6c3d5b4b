use async_trait::async_trait;
use database::mongodb::{Client, check_health_detailed};
use stream_worker::ReadinessProbe;

/// `ping` against the report database.
pub struct MongoProbe {
    client: Client,
    database: String,
}

impl MongoProbe {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }
}

#[async_trait]
impl ReadinessProbe for MongoProbe {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn check(&self) -> Result<(), String> {
        let status = check_health_detailed(&self.client, &self.database).await;
        if status.healthy {
            Ok(())
        } else {
            Err(status
                .message
                .unwrap_or_else(|| "ping failed".to_string()))
        }
    }
}

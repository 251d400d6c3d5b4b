use mongodb::{
    Client,
    bson::doc,
    options::{ClientOptions, Credential},
};
use tracing::info;

use super::MongoConfig;
use crate::common::{RetryConfig, retry, retry_with_backoff};

/// Error type for MongoDB connection setup
#[derive(Debug, thiserror::Error)]
pub enum MongoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Translate a [`MongoConfig`] into driver options.
pub async fn client_options(config: &MongoConfig) -> Result<ClientOptions, MongoError> {
    let mut options = ClientOptions::parse(config.connection_uri()).await?;

    options.connect_timeout = Some(config.connect_timeout());
    options.server_selection_timeout = Some(config.resource_timeout());

    if let Some(username) = &config.username {
        options.credential = Some(
            Credential::builder()
                .username(username.clone())
                .password(config.password.clone())
                .build(),
        );
    }

    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    Ok(options)
}

/// Connect using a MongoConfig and verify the server answers.
pub async fn connect_from_config(config: &MongoConfig) -> Result<Client, MongoError> {
    info!(
        hosts = ?config.hosts,
        database = %config.database,
        authenticated = config.username.is_some(),
        "Connecting to MongoDB"
    );

    let client = Client::with_options(client_options(config).await?)?;

    client
        .database(&config.database)
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| MongoError::ConnectionFailed(e.to_string()))?;

    info!("Connected to MongoDB");
    Ok(client)
}

/// Connect from config, retrying with exponential backoff.
///
/// `None` uses [`RetryConfig::default`].
pub async fn connect_from_config_with_retry(
    config: &MongoConfig,
    retry_config: Option<RetryConfig>,
) -> Result<Client, MongoError> {
    match retry_config {
        Some(policy) => retry_with_backoff(|| connect_from_config(config), policy).await,
        None => retry(|| connect_from_config(config)).await,
    }
}

//! MongoDB connector and utilities

mod config;
mod connector;
mod health;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RESOURCE_TIMEOUT_MS, MongoConfig, parse_hosts,
};
pub use connector::{MongoError, client_options, connect_from_config, connect_from_config_with_retry};
pub use health::{HealthStatus, check_health, check_health_detailed};

pub use mongodb::{Client, Collection, Database};

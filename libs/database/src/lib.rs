//! Connectors for the document store and the stream broker
//!
//! # Features
//!
//! - `redis` (default) - Redis connection manager for stream workers
//! - `mongodb` - MongoDB client built from discrete host/credential settings
//! - `config` - `core_config::FromEnv` implementations for both configs
//!
//! ## Redis
//!
//! ```ignore
//! let config = RedisConfig::from_env()?;
//! let redis = database::redis::connect_with_retry(&config, None).await?;
//! ```
//!
//! ## MongoDB
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//!
//! let config = MongoConfig::from_env()?;
//! let client = connect_from_config_with_retry(&config, None).await?;
//! let db = client.database(config.database());
//! ```

pub mod common;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "mongodb")]
pub mod mongodb;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_required};

/// Redis connection settings for the stream worker
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Connection string, e.g. `redis://:password@host:6379/0`
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

/// `REDIS_URL` (required)
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(env_required("REDIS_URL")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        assert_eq!(RedisConfig::default().url(), "redis://127.0.0.1:6379");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env() {
        temp_env::with_var("REDIS_URL", Some("redis://cache:6379/2"), || {
            let config = RedisConfig::from_env().unwrap();
            assert_eq!(config.url, "redis://cache:6379/2");
        });
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_missing() {
        temp_env::with_var_unset("REDIS_URL", || {
            let err = RedisConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("REDIS_URL"));
        });
    }
}

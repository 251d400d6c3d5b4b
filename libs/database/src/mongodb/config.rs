use std::time::Duration;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_optional, env_required};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_RESOURCE_TIMEOUT_MS: u64 = 5000;

/// MongoDB connection settings
///
/// Hosts and credentials are kept apart so a password never has to be
/// URL-escaped into a connection string.
///
/// ```ignore
/// let config = MongoConfig::new(["mongo-0:27017", "mongo-1:27017"], "waste")
///     .with_credentials("reporter", "secret");
/// ```
#[derive(Clone, Debug)]
pub struct MongoConfig {
    /// `host:port` seeds of the replica set or standalone server
    pub hosts: Vec<String>,

    /// Full connection string, takes precedence over `hosts` when set
    pub url: Option<String>,

    /// Database name to use
    pub database: String,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Optional application name for server logs
    pub app_name: Option<String>,

    /// Timeout for establishing a connection
    pub connect_timeout_ms: u64,

    /// Upper bound for a single query or write round trip
    pub resource_timeout_ms: u64,
}

impl MongoConfig {
    pub fn new<I, S>(hosts: I, database: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            url: None,
            database: database.into(),
            username: None,
            password: None,
            app_name: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            resource_timeout_ms: DEFAULT_RESOURCE_TIMEOUT_MS,
        }
    }

    /// Build from a complete connection string instead of host seeds.
    pub fn from_url(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(Vec::<String>::new(), database)
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_timeouts(mut self, connect_timeout_ms: u64, resource_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self.resource_timeout_ms = resource_timeout_ms;
        self
    }

    /// Connection string without credentials.
    pub fn connection_uri(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("mongodb://{}/", self.hosts.join(",")),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_millis(self.resource_timeout_ms)
    }
}

/// Split a comma separated host list, dropping blanks.
pub fn parse_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(feature = "config")]
fn timeout_ms_or_default(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                tracing::warn!(key, value = %raw, default, "Invalid timeout, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Load MongoConfig from environment variables
///
/// - `MONGO_HOSTS` (required unless `MONGO_URL` is set) - comma separated `host:port` list
/// - `MONGO_URL` (optional) - full connection string
/// - `MONGO_DATABASE` (required)
/// - `MONGO_USERNAME` / `MONGO_PASSWORD` (optional)
/// - `MONGO_APP_NAME` (optional)
/// - `MONGO_CONNECTION_TIMEOUT_MS` (default 3000)
/// - `MONGO_RESOURCE_TIMEOUT_MS` (default 5000)
#[cfg(feature = "config")]
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_optional("MONGO_URL");
        let hosts = match &url {
            Some(_) => Vec::new(),
            None => {
                let hosts = parse_hosts(&env_required("MONGO_HOSTS")?);
                if hosts.is_empty() {
                    return Err(ConfigError::ParseError {
                        key: "MONGO_HOSTS".to_string(),
                        details: "no hosts listed".to_string(),
                    });
                }
                hosts
            }
        };

        Ok(Self {
            hosts,
            url,
            database: env_required("MONGO_DATABASE")?,
            username: env_optional("MONGO_USERNAME"),
            password: env_optional("MONGO_PASSWORD"),
            app_name: env_optional("MONGO_APP_NAME"),
            connect_timeout_ms: timeout_ms_or_default(
                "MONGO_CONNECTION_TIMEOUT_MS",
                DEFAULT_CONNECT_TIMEOUT_MS,
            ),
            resource_timeout_ms: timeout_ms_or_default(
                "MONGO_RESOURCE_TIMEOUT_MS",
                DEFAULT_RESOURCE_TIMEOUT_MS,
            ),
        })
    }
}

//! Stream error types and retry categorization
//!
//! - **Transient**: requeued with exponential backoff
//! - **Permanent**: moved to the DLQ without retry
//! - **RateLimited**: requeued with a longer backoff

use strum::AsRefStr;
use thiserror::Error;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Permanent,
    RateLimited,
}

impl ErrorCategory {
    pub fn max_retries(&self) -> u32 {
        match self {
            ErrorCategory::Transient => 3,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5,
        }
    }

    fn delay_bounds_ms(&self) -> (u64, u64) {
        match self {
            ErrorCategory::Transient => (1000, 30_000),
            ErrorCategory::Permanent => (0, 0),
            ErrorCategory::RateLimited => (5000, 120_000),
        }
    }

    /// Exponential backoff for the given retry count, capped per category.
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        let (base, max) = self.delay_bounds_ms();
        base.saturating_mul(2u64.saturating_pow(retry_count)).min(max)
    }
}

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Job processing failed
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    Shutdown,
}

impl StreamError {
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            StreamError::Serialization(_) => ErrorCategory::Permanent,
            StreamError::Processing { category, .. } => *category,
            StreamError::RateLimited(_) => ErrorCategory::RateLimited,
            StreamError::Config(_) => ErrorCategory::Permanent,
            StreamError::Shutdown => ErrorCategory::Permanent,
        }
    }

    /// Whether a job that already failed `retry_count` times gets another attempt.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        let category = self.category();
        category != ErrorCategory::Permanent && retry_count < category.max_retries()
    }

    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        self.category().backoff_delay_ms(retry_count)
    }

    /// The consumer group (or the stream itself) is gone, e.g. after FLUSHALL.
    pub fn is_nogroup(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.to_string().contains("NOGROUP"))
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StreamError::Redis(e) if e.is_connection_dropped() || e.is_io_error() || e.is_connection_refusal()
        )
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}

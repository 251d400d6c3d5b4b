//! Shared test utilities
//!
//! - `TestRedis`: Redis container (feature: "redis")
//! - `TestMongo`: MongoDB container (feature: "mongodb")
//! - `TestDataBuilder`: deterministic identifiers and names
//!
//! ```rust,ignore
//! use test_utils::{TestMongo, TestDataBuilder};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn writes_report() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("writes_report");
//!     let db = mongo.database(&builder.name("db", "reports"));
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "mongodb")]
mod mongo;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "mongodb")]
pub use mongo::TestMongo;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Seeded generator for reproducible test data
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed derived from the test name.
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic UUID; `n` distinguishes several ids within one test.
    pub fn uuid(&self, n: u64) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.seed.to_le_bytes());
        bytes[8..].copy_from_slice(&n.to_le_bytes());
        Uuid::from_bytes(bytes)
    }

    /// e.g. `test-db-12345-reports`
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let a = TestDataBuilder::from_test_name("my_test");
        let b = TestDataBuilder::from_test_name("my_test");

        assert_eq!(a.uuid(1), b.uuid(1));
        assert_ne!(a.uuid(1), a.uuid(2));
        assert_eq!(a.name("db", "x"), b.name("db", "x"));
    }

    #[test]
    fn test_data_builder_different_names() {
        let a = TestDataBuilder::from_test_name("test1");
        let b = TestDataBuilder::from_test_name("test2");
        assert_ne!(a.uuid(0), b.uuid(0));
    }
}

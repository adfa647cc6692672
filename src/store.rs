use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

/// A store is the shared, TTL-capable key-value backend behind the cache client.
///
/// Stores are format-agnostic: values are opaque strings and the cache client owns
/// the serialization (plain value, empty sentinel or logical-expiration envelope).
/// Every operation is an atomic single-key operation.
///
/// The store implementation is responsible for expiring entries whose TTL has elapsed.
#[async_trait]
pub trait Store: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "hashmap"
    /// - "moka"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Return the stored value.
    ///
    /// The response must be `None` for missing or expired keys. An empty string is a
    /// legitimate value and must be returned as `Some(String::new())`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Sets the value for the given key, overwriting any previous value.
    ///
    /// `ttl` of `None` means the store must never expire the entry on its own.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Sets the value only if the key is absent (or expired).
    ///
    /// Returns `true` iff this call created the entry.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Removes the key from the store. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

//! Cache backend used by the pipeline's response cache and dedup guard
//! (§4.5): two independent maps over the same key-value-with-TTL shape, one
//! keyed on the full request (60s entries), one on the last-user-message
//! fingerprint (5s entries, value-less — presence is all that matters).

mod error;
mod in_memory;

pub use error::CacheError;
pub use in_memory::InMemoryCache;

use async_trait::async_trait;
use std::time::Duration;

/// Key-value storage with optional per-entry TTL and lazy eviction on get.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Clone + Send + Sync,
{
    /// Get a value from the cache by key.
    ///
    /// Returns `None` if the key is not found or has expired.
    async fn get(&self, key: &K) -> Option<V>;

    /// Set a value in the cache with an optional TTL.
    ///
    /// If `ttl` is `None`, the value will not expire.
    /// If `ttl` is `Some(duration)`, the value will expire after that duration.
    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete a value from the cache.
    async fn delete(&self, key: &K) -> Result<(), CacheError>;

    /// Clear all entries from the cache.
    async fn clear(&self) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_trait_object() {
        let cache: Box<dyn Cache<String, String>> = Box::new(InMemoryCache::new());
        cache
            .set("key".to_string(), "value".to_string(), None)
            .await
            .unwrap();
        assert_eq!(
            cache.get(&"key".to_string()).await,
            Some("value".to_string())
        );
    }
}

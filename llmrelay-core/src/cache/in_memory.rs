//! In-process cache backing both the response cache and the in-flight dedup
//! guard: a [`dashmap::DashMap`] keyed by whatever the caller hashes (cache
//! key or dedup key), with an optional per-entry expiry checked lazily on
//! read rather than swept by a background task.

use async_trait::async_trait;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use super::{Cache, CacheError};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// In-memory [`Cache`] implementation. Expired entries are evicted lazily on
/// [`get`](Cache::get); nothing runs in the background.
pub struct InMemoryCache<K, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K, V> InMemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for InMemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for InMemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key)?;
        if let Some(expires_at) = hit.expires_at {
            if Instant::now() >= expires_at {
                drop(hit);
                self.entries.remove(key);
                return None;
            }
        }
        Some(hit.value.clone())
    }

    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.entries.insert(key, Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

//! Cache layer
//!
//! In-memory cache (moka) for the read-only catalogs. Values are stored as
//! JSON strings so any serializable type fits; entries expire on a global
//! TTL. Reference data never changes through the API, so there is no
//! invalidation protocol.

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 1_000;

/// Default TTL for cache entries (10 minutes)
const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, Arc<String>>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Create a new memory cache with default capacity and TTL
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a new memory cache with custom capacity and TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Get a value from the cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .context("Failed to deserialize cache value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Store a value in the cache
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        self.cache.insert(key.to_string(), Arc::new(json)).await;
        Ok(())
    }

    /// Remove a value from the cache
    pub async fn delete(&self, key: &str) {
        self.cache.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_roundtrip() {
        let cache = MemoryCache::new();

        cache.set("answer", &42i64).await.expect("set");
        let value: Option<i64> = cache.get("answer").await.expect("get");

        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = MemoryCache::new();
        let value: Option<String> = cache.get("nothing").await.expect("get");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let cache = MemoryCache::new();
        cache.set("key", &"value").await.expect("set");

        cache.delete("key").await;

        let value: Option<String> = cache.get("key").await.expect("get");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::with_capacity_and_ttl(10, Duration::from_millis(20));
        cache.set("key", &1i64).await.expect("set");

        tokio::time::sleep(Duration::from_millis(50)).await;

        let value: Option<i64> = cache.get("key").await.expect("get");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error() {
        let cache = MemoryCache::new();
        cache.set("key", &"not a number").await.expect("set");

        let result: Result<Option<i64>> = cache.get("key").await;
        assert!(result.is_err());
    }
}

//! Read-through / write-invalidate coordination.
//!
//! Reads go to the cache first and fall back to a loader that hits the
//! store. Writers invalidate after they mutate the store, and the
//! invalidation completes before the write returns.
//!
//! A reader that missed before a writer committed can still repopulate the
//! cache with the old value after the writer's invalidation. That entry
//! lives until its TTL runs out. No locking is done to prevent it.

use std::future::Future;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use super::backend::{CacheBackend, CacheError};

/// Entry lifetimes per entity class.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    /// Single entities
    pub entity: Duration,
    /// Collection and owner-scoped views
    pub list: Duration,
    pub basket: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            entity: Duration::from_secs(30 * 60),
            list: Duration::from_secs(5 * 60),
            basket: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Clone)]
pub struct CacheAside {
    backend: CacheBackend,
}

impl CacheAside {
    pub fn new(backend: CacheBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    /// Returns the cached value for `key`, or loads, caches and returns it.
    ///
    /// Cache errors and undecodable entries are treated as a miss. Loader
    /// errors are returned as is and nothing is cached.
    pub async fn get<T, E, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.backend.get(key).await {
            Ok(Some(data)) => match serde_json::from_slice::<T>(&data) {
                Ok(value) => {
                    tracing::debug!(key = %key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "dropping undecodable cache entry");
                    self.invalidate(key).await;
                }
            },
            Ok(None) => tracing::debug!(key = %key, "cache miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "cache read failed, using store"),
        }

        let value = loader().await?;

        match serde_json::to_vec(&value) {
            Ok(data) => {
                if let Err(e) = self.backend.set(key, data, ttl).await {
                    tracing::warn!(key = %key, error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "failed to encode value for cache"),
        }

        Ok(value)
    }

    /// Deletes `key`. Failures are logged.
    pub async fn invalidate(&self, key: &str) {
        match self.backend.delete(key).await {
            Ok(()) => tracing::debug!(key = %key, "cache invalidated"),
            Err(e) => tracing::warn!(key = %key, error = %e, "cache invalidation failed"),
        }
    }

    pub async fn invalidate_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            self.invalidate(key.as_ref()).await;
        }
    }

    /// Deletes every key under `prefix`. Unlike `invalidate` this reports
    /// errors.
    pub async fn flush(&self, prefix: &str) -> Result<u64, CacheError> {
        let removed = self.backend.delete_prefix(prefix).await?;
        tracing::info!(prefix = %prefix, removed, "cache flushed");
        Ok(removed)
    }

    /// Stores a raw token, e.g. a confirmation code.
    pub async fn put_token(&self, key: &str, token: &str, ttl: Duration) -> Result<(), CacheError> {
        self.backend
            .set(key, token.as_bytes().to_vec(), ttl)
            .await
    }

    /// Moves a pending token to a new key, keeping its expiry. Returns
    /// whether a token was moved; failures are logged and count as `false`.
    pub async fn move_token(&self, from: &str, to: &str) -> bool {
        match self.backend.rename(from, to).await {
            Ok(moved) => moved,
            Err(e) => {
                tracing::warn!(from = %from, to = %to, error = %e, "token move failed");
                false
            }
        }
    }

    /// Consumes the token at `key` if it equals `token`.
    ///
    /// Returns `false` on mismatch, miss or cache error; a mismatching
    /// submission leaves the stored token in place.
    pub async fn claim_token(&self, key: &str, token: &str) -> bool {
        match self.backend.take_if_equals(key, token.as_bytes()).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "token claim failed, treating as miss");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = CacheAside::new(CacheBackend::new_local());
        let counter = AtomicU32::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(vec!["a".to_string()])
        };

        let first = cache.get("user:all", Duration::from_secs(60), load).await;
        let second = cache.get("user:all", Duration::from_secs(60), load).await;

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = CacheAside::new(CacheBackend::new_local());

        let failed: Result<String, &str> = cache
            .get("user:1", Duration::from_secs(60), || async { Err("not found") })
            .await;
        assert_eq!(failed, Err("not found"));
        assert_eq!(cache.backend().local_len(), 0);
    }

    #[tokio::test]
    async fn undecodable_entry_falls_back_to_loader() {
        let backend = CacheBackend::new_local();
        backend
            .set("instrument:1", b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = CacheAside::new(backend);

        let value: Result<u32, String> = cache
            .get("instrument:1", Duration::from_secs(60), || async { Ok(7) })
            .await;
        assert_eq!(value, Ok(7));

        let cached = cache.backend().get("instrument:1").await.unwrap().unwrap();
        assert_eq!(cached.as_slice(), b"7");
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = CacheAside::new(CacheBackend::new_local());
        let ttl = Duration::from_secs(60);

        let _ = cache.get("user:1", ttl, || async { Ok::<_, String>(1) }).await;
        cache.invalidate("user:1").await;
        let reloaded = cache.get("user:1", ttl, || async { Ok::<_, String>(2) }).await;

        assert_eq!(reloaded, Ok(2));
    }

    #[tokio::test]
    async fn claim_token_is_single_use() {
        let cache = CacheAside::new(CacheBackend::new_local());
        cache
            .put_token("confirm_code:x@y.z", "123456", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!cache.claim_token("confirm_code:x@y.z", "654321").await);
        assert!(cache.claim_token("confirm_code:x@y.z", "123456").await);
        assert!(!cache.claim_token("confirm_code:x@y.z", "123456").await);
    }
}

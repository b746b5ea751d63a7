//! Cache backend: a process-local DashMap or a shared Redis.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Deletes `KEYS[1]` only if it currently holds `ARGV[1]`.
static TAKE_IF_EQUALS: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#,
    )
});

/// Renames `KEYS[1]` to `KEYS[2]` if it exists. The TTL moves with it.
static RENAME_IF_EXISTS: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('RENAME', KEYS[1], KEYS[2])
    return 1
end
return 0
"#,
    )
});

const SCAN_BATCH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Key-value cache with per-entry expiry.
///
/// - **Local**: one instance, entries live in a DashMap.
/// - **Redis**: shared by every instance of a service. There is no local
///   tier in this mode, so an invalidation is visible to all instances as
///   soon as the `DEL` returns.
///
/// All operations report errors; deciding whether an error matters is up to
/// the caller.
#[derive(Clone)]
pub enum CacheBackend {
    Local(Arc<DashMap<String, CachedEntry>>),
    Redis(Pool),
}

impl CacheBackend {
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    pub fn new_redis(pool: Pool) -> Self {
        CacheBackend::Redis(pool)
    }

    pub fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis(_) => "redis",
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        match self {
            CacheBackend::Local(map) => {
                if let Some(entry) = map.get(key) {
                    if !entry.is_expired() {
                        return Ok(Some(Arc::clone(&entry.data)));
                    }
                    // Remove expired entry
                    drop(entry);
                    map.remove_if(key, |_, entry| entry.is_expired());
                }
                Ok(None)
            }
            CacheBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let data: Option<Vec<u8>> = conn.get(key).await?;
                Ok(data.map(Arc::new))
            }
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
                Ok(())
            }
            CacheBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                conn.pset_ex::<_, _, ()>(key, value, ttl_ms).await?;
                tracing::debug!(key = %key, ttl_ms, "cache set");
                Ok(())
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.remove(key);
                Ok(())
            }
            CacheBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                conn.del::<_, ()>(key).await?;
                Ok(())
            }
        }
    }

    /// Removes `key` only if it holds exactly `expected`, atomically.
    ///
    /// Returns `true` if this call removed the entry.
    pub async fn take_if_equals(&self, key: &str, expected: &[u8]) -> Result<bool, CacheError> {
        match self {
            CacheBackend::Local(map) => Ok(map
                .remove_if(key, |_, entry| {
                    !entry.is_expired() && entry.data.as_slice() == expected
                })
                .is_some()),
            CacheBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let removed: i64 = TAKE_IF_EQUALS
                    .key(key)
                    .arg(expected)
                    .invoke_async(&mut conn)
                    .await?;
                Ok(removed > 0)
            }
        }
    }

    /// Moves the entry at `from` to `to`, keeping its remaining lifetime.
    ///
    /// Returns `false` if there was nothing to move.
    pub async fn rename(&self, from: &str, to: &str) -> Result<bool, CacheError> {
        match self {
            CacheBackend::Local(map) => match map.remove(from) {
                Some((_, entry)) if !entry.is_expired() => {
                    map.insert(to.to_string(), entry);
                    Ok(true)
                }
                _ => Ok(false),
            },
            CacheBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let moved: i64 = RENAME_IF_EXISTS
                    .key(from)
                    .key(to)
                    .invoke_async(&mut conn)
                    .await?;
                Ok(moved > 0)
            }
        }
    }

    /// Deletes every key starting with `prefix`. Returns how many were removed.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        match self {
            CacheBackend::Local(map) => {
                let keys: Vec<String> = map
                    .iter()
                    .filter(|entry| entry.key().starts_with(prefix))
                    .map(|entry| entry.key().clone())
                    .collect();
                let removed = keys
                    .iter()
                    .filter(|key| map.remove(key.as_str()).is_some())
                    .count();
                Ok(removed as u64)
            }
            CacheBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let pattern = format!("{prefix}*");
                let mut cursor: u64 = 0;
                let mut removed: u64 = 0;
                loop {
                    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await?;
                    if !keys.is_empty() {
                        let count: u64 = conn.del(&keys).await?;
                        removed += count;
                    }
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Ok(removed)
            }
        }
    }

    /// Drops expired local entries. Redis expires keys itself.
    pub fn remove_expired(&self) -> usize {
        match self {
            CacheBackend::Local(map) => {
                let before = map.len();
                map.retain(|_, entry| !entry.is_expired());
                before.saturating_sub(map.len())
            }
            CacheBackend::Redis(_) => 0,
        }
    }

    /// Starts a background task calling [`remove_expired`](Self::remove_expired)
    /// every `every`, for the local backend only. The task ends once the
    /// last handle to the cache is dropped.
    pub fn start_sweeper(&self, every: Duration) -> Option<JoinHandle<()>> {
        let CacheBackend::Local(map) = self else {
            return None;
        };
        let map = Arc::downgrade(map);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(map) = map.upgrade() else {
                    break;
                };
                let removed = CacheBackend::Local(map).remove_expired();
                if removed > 0 {
                    tracing::debug!(removed, "expired cache entries swept");
                }
            }
        }))
    }

    /// Number of live local entries. Always zero in Redis mode.
    pub fn local_len(&self) -> usize {
        match self {
            CacheBackend::Local(map) => map.iter().filter(|e| !e.is_expired()).count(),
            CacheBackend::Redis(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_get_set_delete() {
        let cache = CacheBackend::new_local();
        cache
            .set("user:1", b"alice".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let value = cache.get("user:1").await.unwrap();
        assert_eq!(value.as_deref().map(Vec::as_slice), Some(&b"alice"[..]));
        assert_eq!(cache.mode(), "local");

        cache.delete("user:1").await.unwrap();
        assert!(cache.get("user:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_entries_expire() {
        let cache = CacheBackend::new_local();
        cache
            .set("cart:1", b"{}".to_vec(), Duration::from_millis(30))
            .await
            .unwrap();
        assert!(cache.get("cart:1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("cart:1").await.unwrap().is_none());
        assert_eq!(cache.local_len(), 0);
    }

    #[tokio::test]
    async fn take_if_equals_only_consumes_exact_match() {
        let cache = CacheBackend::new_local();
        cache
            .set("confirm_code:a@b.c", b"042042".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!cache.take_if_equals("confirm_code:a@b.c", b"999999").await.unwrap());
        assert!(cache.get("confirm_code:a@b.c").await.unwrap().is_some());

        assert!(cache.take_if_equals("confirm_code:a@b.c", b"042042").await.unwrap());
        assert!(!cache.take_if_equals("confirm_code:a@b.c", b"042042").await.unwrap());
    }

    #[tokio::test]
    async fn rename_moves_live_entries_only() {
        let cache = CacheBackend::new_local();
        cache
            .set("confirm_code:old@x.y", b"111111".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.rename("confirm_code:old@x.y", "confirm_code:new@x.y").await.unwrap());
        assert!(cache.get("confirm_code:old@x.y").await.unwrap().is_none());
        assert!(cache.get("confirm_code:new@x.y").await.unwrap().is_some());

        assert!(!cache.rename("confirm_code:old@x.y", "confirm_code:other@x.y").await.unwrap());

        cache
            .set("confirm_code:stale@x.y", b"1".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.rename("confirm_code:stale@x.y", "confirm_code:fresh@x.y").await.unwrap());
        assert!(cache.get("confirm_code:fresh@x.y").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_swept_without_being_read() {
        let cache = CacheBackend::new_local();
        cache
            .set("user:gone", b"x".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set("user:kept", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let CacheBackend::Local(map) = &cache else {
            unreachable!()
        };

        let sweeper = cache.start_sweeper(Duration::from_millis(20)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(map.len(), 1);
        assert!(map.contains_key("user:kept"));
        sweeper.abort();
    }

    #[tokio::test]
    async fn sweeper_stops_with_the_cache() {
        let cache = CacheBackend::new_local();
        let sweeper = cache.start_sweeper(Duration::from_millis(10)).unwrap();
        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweeper exits")
            .unwrap();
    }

    #[tokio::test]
    async fn delete_prefix_leaves_other_kinds() {
        let cache = CacheBackend::new_local();
        let ttl = Duration::from_secs(60);
        for key in ["instrument:1", "instrument:all", "user:1"] {
            cache.set(key, b"x".to_vec(), ttl).await.unwrap();
        }

        assert_eq!(cache.delete_prefix("instrument:").await.unwrap(), 2);
        assert!(cache.get("user:1").await.unwrap().is_some());
        assert!(cache.get("instrument:all").await.unwrap().is_none());
    }
}

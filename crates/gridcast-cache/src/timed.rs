use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::debug;

use crate::clock::Clock;

/// A cached value with the time it was stored and how long it stays fresh.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Stale once strictly more than `ttl` has elapsed since creation.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match (now - self.created_at).to_std() {
            Ok(age) => age > self.ttl,
            // Clock went backwards; the entry is younger than zero.
            Err(_) => false,
        }
    }
}

/// Concurrent key/value cache with per-entry expiry, backed by moka.
///
/// Freshness is judged against the injected [`Clock`] rather than moka's
/// internal timer, so expiry is exact and testable. Stale entries are
/// dropped on read.
pub struct TimedCache<V> {
    inner: Cache<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> TimedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(max_capacity: u64, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
            ttl,
            clock,
        }
    }

    /// Fresh value for `key`, or `None` when absent or stale.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entry = self.inner.get(key).await?;
        if entry.is_stale(self.clock.now()) {
            debug!(key, "Cache entry stale");
            self.inner.invalidate(key).await;
            return None;
        }
        Some(entry.value)
    }

    /// Store `value` with the current time and the cache's TTL.
    pub async fn put(&self, key: String, value: V) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl: self.ttl,
        };
        self.inner.insert(key, entry).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Approximate number of stored entries, stale ones included until read.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn setup() -> (Arc<ManualClock>, TimedCache<String>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 15, 12, 0, 0).unwrap(),
        ));
        let cache = TimedCache::new(100, TimedCache::<String>::DEFAULT_TTL, clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn put_and_get() {
        let (_, cache) = setup();
        cache.put("key1".to_string(), "value1".to_string()).await;

        let result = cache.get("key1").await;
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn get_missing() {
        let (_, cache) = setup();
        assert_eq!(cache.get("nonexistent").await, None);
    }

    #[tokio::test]
    async fn invalidate() {
        let (_, cache) = setup();
        cache.put("key1".to_string(), "value1".to_string()).await;
        cache.invalidate("key1").await;

        assert_eq!(cache.get("key1").await, None);
    }

    #[tokio::test]
    async fn hit_just_inside_ttl() {
        let (clock, cache) = setup();
        cache.put("key1".to_string(), "value1".to_string()).await;

        clock.advance(ChronoDuration::seconds(299));
        assert!(cache.get("key1").await.is_some());

        clock.advance(ChronoDuration::seconds(1));
        assert!(cache.get("key1").await.is_some());
    }

    #[tokio::test]
    async fn miss_after_ttl() {
        let (clock, cache) = setup();
        cache.put("key1".to_string(), "value1".to_string()).await;

        clock.advance(ChronoDuration::seconds(301));
        assert!(cache.get("key1").await.is_none());

        // The stale entry is gone even if the clock is rewound.
        clock.advance(ChronoDuration::seconds(-301));
        assert!(cache.get("key1").await.is_none());
    }

    #[tokio::test]
    async fn overwrite_refreshes_creation_time() {
        let (clock, cache) = setup();
        cache.put("key1".to_string(), "old".to_string()).await;
        clock.advance(ChronoDuration::seconds(200));
        cache.put("key1".to_string(), "new".to_string()).await;
        clock.advance(ChronoDuration::seconds(200));

        assert_eq!(cache.get("key1").await, Some("new".to_string()));
    }

    #[tokio::test]
    async fn keys_expire_independently() {
        let (clock, cache) = setup();
        cache.put("a".to_string(), "1".to_string()).await;
        clock.advance(ChronoDuration::seconds(200));
        cache.put("b".to_string(), "2".to_string()).await;
        clock.advance(ChronoDuration::seconds(150));

        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn concurrent_writers_on_distinct_keys() {
        let (_, cache) = setup();
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let key = format!("loc-{i}");
                cache.put(key.clone(), format!("v{i}")).await;
                cache.get(&key).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(format!("v{i}")));
        }
        assert_eq!(cache.entry_count().await, 16);
    }

    #[test]
    fn entry_staleness_boundary() {
        let created = Utc.with_ymd_and_hms(2026, 4, 15, 12, 0, 0).unwrap();
        let entry = CacheEntry {
            value: (),
            created_at: created,
            ttl: Duration::from_secs(300),
        };
        assert!(!entry.is_stale(created + ChronoDuration::seconds(300)));
        assert!(entry.is_stale(created + ChronoDuration::milliseconds(300_001)));
        assert!(!entry.is_stale(created - ChronoDuration::seconds(5)));
    }
}

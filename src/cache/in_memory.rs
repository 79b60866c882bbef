//! Process-local cache backed by a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{CacheError, DistributedCache};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`DistributedCache`]. Expired entries are dropped lazily on read,
/// by [`InMemoryCache::purge_expired`], or by the task from
/// [`InMemoryCache::spawn_purge_task`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Purge expired entries every `every` until the runtime shuts down.
    pub fn spawn_purge_task(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            tracing::info!(interval_ms = every.as_millis() as u64, "Cache purge task started");
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "Purged expired cache entries");
                }
            }
        })
    }
}

#[async_trait]
impl DistributedCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Backend(format!("ttl of {}s is out of range", ttl.as_secs())))?;
        self.entries.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_delete() {
        let cache = InMemoryCache::new();
        let c = &cache as &dyn DistributedCache;

        c.set("k1", "v1".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(c.get("k1").await.unwrap().as_deref(), Some("v1"));
        assert!(c.get("k2").await.unwrap().is_none());

        c.delete("k1").await.unwrap();
        assert!(c.get("k1").await.unwrap().is_none());

        // Deleting an absent key is fine.
        c.delete("k1").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".into(), Duration::ZERO).await.unwrap();

        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = InMemoryCache::new();
        cache.set("old", "v".into(), Duration::ZERO).await.unwrap();
        cache.set("new", "v".into(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let cache = InMemoryCache::new();
        let err = cache.set("k", "v".into(), Duration::MAX).await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_purge_task_drops_abandoned_entries() {
        let cache = InMemoryCache::new();
        for i in 0..50 {
            cache
                .set(&format!("k{i}"), "v".into(), Duration::from_millis(20))
                .await
                .unwrap();
        }
        cache.set("live", "v".into(), Duration::from_secs(60)).await.unwrap();

        let task = cache.spawn_purge_task(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("live").await.unwrap().as_deref(), Some("v"));
    }
}

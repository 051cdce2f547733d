//! Process-local page cache

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::{CacheError, CacheMetrics, CacheResult, PageCache};

/// Entry limit when none is configured
pub const DEFAULT_MAX_ENTRIES: usize = 300;

/// Share of entries dropped when the limit is hit (one in `CULL_FREQUENCY`)
const CULL_FREQUENCY: usize = 3;

struct Entry {
    page: String,
    expires_at: Instant,
}

/// In-memory page cache.
///
/// Expired entries are swept on every write and the map never holds more
/// than `max_entries` pages; when full, the entries closest to expiry are
/// culled first.
///
/// Deadlines use `tokio::time::Instant`, so tests running with a paused clock
/// can step past the TTL with `tokio::time::advance`.
#[derive(Clone)]
pub struct MemoryPageCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    max_entries: usize,
    metrics: CacheMetrics,
}

impl Default for MemoryPageCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
            metrics: CacheMetrics::default(),
        }
    }

    /// Number of live (unexpired) entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    debug!(key = %key, "Page cache hit");
                    self.metrics.record_hit(key);
                    return Ok(Some(entry.page.clone()));
                }
                Some(_) => {}
                None => {
                    debug!(key = %key, "Page cache miss");
                    self.metrics.record_miss(key);
                    return Ok(None);
                }
            }
        }

        // Expired: evict so the map does not grow with dead pages
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        debug!(key = %key, "Page cache entry expired");
        self.metrics.record_miss(key);
        Ok(None)
    }

    async fn set(&self, key: &str, page: &str, ttl: Duration) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("empty key".to_string()));
        }

        let now = Instant::now();
        let entry = Entry {
            page: page.to_string(),
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            cull(&mut entries, self.max_entries);
        }
        entries.insert(key.to_string(), entry);

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Page cache set");
        self.metrics.record_write(key);
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}

/// Drop the entries closest to expiry until a new one fits
fn cull(entries: &mut HashMap<String, Entry>, max_entries: usize) {
    let target = (max_entries / CULL_FREQUENCY).max(entries.len() + 1 - max_entries);
    let mut by_deadline: Vec<(Instant, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.expires_at, key.clone()))
        .collect();
    by_deadline.sort();

    for (_, key) in by_deadline.into_iter().take(target) {
        entries.remove(&key);
    }
    debug!(culled = target, "Page cache full");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageKey;

    #[tokio::test(start_paused = true)]
    async fn test_entry_served_within_ttl_and_dropped_after() {
        let cache = MemoryPageCache::new();
        let key = PageKey::page("index_page", None, "1");

        cache
            .set(&key, "<html>first</html>", Duration::from_secs(20))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(19)).await;
        assert_eq!(
            cache.get(&key).await.unwrap().as_deref(),
            Some("<html>first</html>")
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = MemoryPageCache::new();
        let ttl = Duration::from_secs(60);

        cache.set("v1:index_page:anon:1", "a", ttl).await.unwrap();
        cache.set("v1:index_page:anon:1", "b", ttl).await.unwrap();

        assert_eq!(
            cache.get("v1:index_page:anon:1").await.unwrap().as_deref(),
            Some("b")
        );
    }

    #[tokio::test]
    async fn test_clear_prefix_only_touches_matching_keys() {
        let cache = MemoryPageCache::new();
        let ttl = Duration::from_secs(60);

        cache.set(&PageKey::page("index_page", None, "1"), "a", ttl).await.unwrap();
        cache.set(&PageKey::page("index_page", Some(1), "1"), "b", ttl).await.unwrap();
        cache.set(&PageKey::page("about", None, ""), "c", ttl).await.unwrap();

        let removed = cache
            .clear_prefix(&PageKey::prefix("index_page"))
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_swept_on_write() {
        let cache = MemoryPageCache::with_max_entries(5_000);
        let ttl = Duration::from_secs(20);

        for page in 0..1000 {
            let key = PageKey::page("index_page", None, &page.to_string());
            cache.set(&key, "<html></html>", ttl).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(60)).await;
        cache
            .set(&PageKey::page("index_page", None, "1"), "fresh", ttl)
            .await
            .unwrap();

        assert_eq!(cache.entries.read().await.len(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_count_is_capped() {
        let cache = MemoryPageCache::with_max_entries(3);

        for page in 0..10u64 {
            let key = PageKey::page("index_page", None, &page.to_string());
            cache
                .set(&key, "page", Duration::from_secs(60 + page))
                .await
                .unwrap();
            assert!(cache.entries.read().await.len() <= 3);
        }

        let newest = PageKey::page("index_page", None, "9");
        assert_eq!(cache.get(&newest).await.unwrap().as_deref(), Some("page"));
        let oldest = PageKey::page("index_page", None, "0");
        assert_eq!(cache.get(&oldest).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rewriting_a_key_at_the_limit_keeps_others() {
        let cache = MemoryPageCache::with_max_entries(2);
        let ttl = Duration::from_secs(60);

        cache.set("v1:index_page:anon:1", "a", ttl).await.unwrap();
        cache.set("v1:index_page:anon:2", "b", ttl).await.unwrap();
        cache.set("v1:index_page:anon:2", "c", ttl).await.unwrap();

        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let cache = MemoryPageCache::new();
        let result = cache.set("", "page", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }
}

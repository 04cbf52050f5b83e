//! Federated search result cache with TTL and LRU eviction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::search::SearchResponse;

/// Default cache TTL: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct CachedSearch {
    response: SearchResponse,
    cached_at: Instant,
}

struct CacheInner {
    entries: HashMap<String, CachedSearch>,
    /// Keys ordered oldest-used first.
    usage_order: Vec<String>,
}

/// Thread-safe search cache keyed by query fingerprint.
pub struct SearchCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(max_entries: usize) -> Self {
        Self::with_ttl(max_entries, DEFAULT_TTL)
    }

    pub fn with_ttl(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                usage_order: Vec::new(),
            }),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// Fetch a live entry, refreshing its LRU position.
    pub fn get(&self, key: &str) -> Option<SearchResponse> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.entries.get(key)?;
        if entry.cached_at.elapsed() > self.ttl {
            inner.entries.remove(key);
            inner.usage_order.retain(|k| k != key);
            return None;
        }
        let response = entry.response.clone();
        inner.usage_order.retain(|k| k != key);
        inner.usage_order.push(key.to_string());
        Some(response)
    }

    pub fn store(&self, key: String, response: SearchResponse) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.contains_key(&key) {
            inner.usage_order.retain(|k| k != &key);
        }
        while inner.entries.len() >= self.max_entries && !inner.usage_order.is_empty() {
            let oldest = inner.usage_order.remove(0);
            inner.entries.remove(&oldest);
            tracing::debug!(key = %oldest, "Search cache: evicted oldest entry");
        }
        inner.entries.insert(
            key.clone(),
            CachedSearch {
                response,
                cached_at: Instant::now(),
            },
        );
        inner.usage_order.push(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn response() -> SearchResponse {
        SearchResponse {
            results: Vec::new(),
            sources: BTreeMap::new(),
            has_more: false,
        }
    }

    #[test]
    fn test_store_and_get() {
        let cache = SearchCache::new(10);
        cache.store("k1".into(), response());
        assert!(cache.get("k1").is_some());
        assert!(cache.get("k2").is_none());
    }

    #[test]
    fn test_expired_entries_removed() {
        let cache = SearchCache::with_ttl(10, Duration::from_millis(0));
        cache.store("k1".into(), response());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = SearchCache::new(2);
        cache.store("a".into(), response());
        cache.store("b".into(), response());
        // Touch "a" so "b" is the coldest entry.
        cache.get("a");
        cache.store("c".into(), response());
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }
}

//! In-process TTL cache for serialized query responses.
//!
//! Trend data only changes when games finish or lines are backfilled, so
//! identical queries within the TTL are served from memory.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: serde_json::Value,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

/// Thread-safe TTL cache, cheap to clone.
#[derive(Debug, Clone)]
pub struct QueryCache {
    inner: Arc<RwLock<Inner>>,
    ttl: Duration,
    max_entries: usize,
}

impl QueryCache {
    /// `max_entries == 0` disables caching.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            ttl,
            max_entries,
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        // A panic mid-update leaves at worst a stale entry; keep serving.
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.write();
        let fresh = inner
            .entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone());

        match fresh {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.entries.remove(key);
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: String, value: serde_json::Value) {
        if self.max_entries == 0 {
            return;
        }
        let ttl = self.ttl;
        let mut inner = self.write();
        inner.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);

        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "Evicting oldest cache entry");
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry; returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.write();
        let n = inner.entries.len();
        inner.entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            ttl_secs: self.ttl.as_secs(),
            max_entries: self.max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_and_miss() {
        let cache = QueryCache::new(Duration::from_secs(1800), 10);
        assert!(cache.get("a").is_none());
        cache.insert("a".to_string(), json!({"rows": 1}));
        assert_eq!(cache.get("a"), Some(json!({"rows": 1})));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert_eq!(stats.ttl_secs, 1800);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = QueryCache::new(Duration::ZERO, 10);
        cache.insert("a".to_string(), json!(1));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let cache = QueryCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), json!(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), json!(2));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), json!(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = QueryCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("b".to_string(), json!(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), Some(json!(3)));
    }

    #[test]
    fn test_disabled_and_clear() {
        let disabled = QueryCache::new(Duration::from_secs(60), 0);
        disabled.insert("a".to_string(), json!(1));
        assert!(disabled.is_empty());

        let cache = QueryCache::new(Duration::from_secs(60), 5);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }
}

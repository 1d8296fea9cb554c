//! Best-effort offline copy of each feed's most recent items.
//!
//! Nothing here returns an error to the caller: a failed write is logged and
//! dropped, and an unreadable entry reads as a cache miss.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::FeedItem;
use crate::store::KvStore;

/// Items kept per feed.
pub const DEFAULT_CAPACITY: usize = 50;

const NAMESPACE: &str = "feedsync:";

/// Summary of one cached feed, for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFeed {
    pub feed_key: String,
    pub item_count: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OfflineCache {
    store: Arc<dyn KvStore + Send + Sync>,
    capacity: usize,
}

impl OfflineCache {
    pub fn new(store: Arc<dyn KvStore + Send + Sync>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KvStore + Send + Sync>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn storage_key(feed_key: &str) -> String {
        format!("{}{}", NAMESPACE, feed_key)
    }

    /// Persist the first `capacity` items, replacing whatever was stored.
    pub fn save(&self, feed_key: &str, items: &[FeedItem]) {
        let head = &items[..items.len().min(self.capacity)];

        let encoded = match serde_json::to_string(head) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Could not encode cache for {}: {}", feed_key, e);
                return;
            }
        };

        match self.store.put(&Self::storage_key(feed_key), &encoded) {
            Ok(()) => debug!("Cached {} items for {}", head.len(), feed_key),
            Err(e) => warn!("Cache write for {} failed: {}", feed_key, e),
        }
    }

    /// Last saved items, or empty when nothing usable is stored.
    pub fn load(&self, feed_key: &str) -> Vec<FeedItem> {
        let entry = match self.store.get(&Self::storage_key(feed_key)) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Cache read for {} failed: {}", feed_key, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<FeedItem>>(&entry.value) {
            Ok(items) => items,
            Err(e) => {
                warn!("Discarding malformed cache entry for {}: {}", feed_key, e);
                Vec::new()
            }
        }
    }

    pub fn clear(&self, feed_key: &str) -> bool {
        match self.store.remove(&Self::storage_key(feed_key)) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cache clear for {} failed: {}", feed_key, e);
                false
            }
        }
    }

    /// Drop every cached feed, e.g. on logout. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let removed = self
            .feeds()
            .iter()
            .filter(|feed| self.clear(&feed.feed_key))
            .count();
        info!("Cleared {} cached feeds", removed);
        removed
    }

    pub fn feeds(&self) -> Vec<CachedFeed> {
        let entries = match self.store.list(NAMESPACE) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cache listing failed: {}", e);
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .map(|entry| CachedFeed {
                feed_key: entry.key[NAMESPACE.len()..].to_string(),
                item_count: serde_json::from_str::<Vec<serde_json::Value>>(&entry.value)
                    .map(|items| items.len())
                    .unwrap_or(0),
                updated_at: entry.updated_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{FeedSyncError, Result};
    use crate::store::{CacheEntry, MemoryStore, SqliteStore};
    use tokio_test::assert_ok;

    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn put(&self, _key: &str, _value: &str) -> Result<()> {
            Err(FeedSyncError::Storage("disk full".into()))
        }
        fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
            Err(FeedSyncError::Storage("disk gone".into()))
        }
        fn remove(&self, _key: &str) -> Result<bool> {
            Err(FeedSyncError::Storage("disk gone".into()))
        }
        fn list(&self, _prefix: &str) -> Result<Vec<CacheEntry>> {
            Err(FeedSyncError::Storage("disk gone".into()))
        }
    }

    fn items(range: std::ops::Range<i64>) -> Vec<FeedItem> {
        range.map(FeedItem::new).collect()
    }

    #[test]
    fn test_save_and_load() {
        let cache = OfflineCache::new(Arc::new(MemoryStore::new()));
        cache.save("feed:news", &items(1..4));
        assert_eq!(cache.load("feed:news"), items(1..4));
    }

    #[test]
    fn test_save_keeps_most_recent_capacity_items() {
        let cache = OfflineCache::new(Arc::new(MemoryStore::new()));
        cache.save("feed:news", &items(1..81));

        let loaded = cache.load("feed:news");
        assert_eq!(loaded.len(), DEFAULT_CAPACITY);
        assert_eq!(loaded, items(1..51));
    }

    #[test]
    fn test_save_overwrites() {
        let cache = OfflineCache::new(Arc::new(MemoryStore::new()));
        cache.save("feed:news", &items(1..10));
        cache.save("feed:news", &items(20..22));
        assert_eq!(cache.load("feed:news"), items(20..22));
    }

    #[test]
    fn test_missing_entry_is_empty() {
        let cache = OfflineCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load("feed:news").is_empty());
    }

    #[test]
    fn test_malformed_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        assert_ok!(store.put("feedsync:feed:news", "{not json"));
        let cache = OfflineCache::new(store);
        assert!(cache.load("feed:news").is_empty());
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let cache = OfflineCache::new(Arc::new(BrokenStore));
        cache.save("feed:news", &items(1..3));
        assert!(cache.load("feed:news").is_empty());
        assert!(!cache.clear("feed:news"));
        assert!(cache.feeds().is_empty());
        assert_eq!(cache.clear_all(), 0);
    }

    #[test]
    fn test_feeds_are_isolated() {
        let cache = OfflineCache::new(Arc::new(SqliteStore::in_memory().unwrap()));
        cache.save("feed:news", &items(1..3));
        cache.save("feed:posts:1", &items(7..8));

        assert_eq!(cache.load("feed:news").len(), 2);
        assert_eq!(cache.load("feed:posts:1"), items(7..8));

        let listed: Vec<(String, usize)> = cache
            .feeds()
            .into_iter()
            .map(|f| (f.feed_key, f.item_count))
            .collect();
        assert_eq!(
            listed,
            vec![("feed:news".to_string(), 2), ("feed:posts:1".to_string(), 1)]
        );
    }

    #[test]
    fn test_clear_all() {
        let cache = OfflineCache::new(Arc::new(MemoryStore::new()));
        cache.save("feed:news", &items(1..3));
        cache.save("feed:posts:1", &items(1..3));
        assert_eq!(cache.clear_all(), 2);
        assert!(cache.feeds().is_empty());
    }
}

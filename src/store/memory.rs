use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::app::{FeedSyncError, Result};
use crate::store::{CacheEntry, KvStore};

/// Non-durable store, for tests and `--no-cache` style runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|e| FeedSyncError::Storage(e.to_string()))
    }
}

impl KvStore for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries()?.remove(key).is_some())
    }

    fn list(&self, prefix: &str) -> Result<Vec<CacheEntry>> {
        Ok(self
            .entries()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

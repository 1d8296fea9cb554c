pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Durable key-value storage backing the offline cache.
pub trait KvStore {
    /// Insert or overwrite `key`.
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn remove(&self, key: &str) -> Result<bool>;
    /// Entries whose key starts with `prefix`, ordered by key.
    fn list(&self, prefix: &str) -> Result<Vec<CacheEntry>>;
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{FeedSyncError, Result};
use crate::store::{CacheEntry, KvStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| FeedSyncError::Storage(format!("migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FeedSyncError::Storage(e.to_string()))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
        Ok(CacheEntry {
            key: row.get(0)?,
            value: row.get(1)?,
            updated_at: row
                .get::<_, String>(2)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl KvStore for SqliteStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT key, value, updated_at FROM cache_entries WHERE key = ?1",
                params![key],
                Self::entry_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn list(&self, prefix: &str) -> Result<Vec<CacheEntry>> {
        let conn = self.conn()?;

        // substr keeps `_` and `%` in keys from acting as LIKE wildcards
        let mut stmt = conn.prepare(
            "SELECT key, value, updated_at FROM cache_entries
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
        )?;

        let entries = stmt
            .query_map(params![prefix], Self::entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

//! Report cache
//!
//! Finished reports are stored as JSON keyed by normalized channel
//! username, each with a fixed expiry. Expired rows are treated as absent
//! and purged on the next write.

pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::analytics::Report;
use crate::error::{Error, Result};

/// Storage for finished reports.
pub trait ReportCache: Send + Sync {
    /// The stored report, unless missing or expired at `now`.
    fn get(&self, username: &str, now: DateTime<Utc>) -> Result<Option<Report>>;

    /// Store (or replace) a report valid until `now + ttl`.
    fn put(&self, username: &str, report: &Report, ttl: Duration, now: DateTime<Utc>) -> Result<()>;

    /// Drop a stored report. Returns whether one existed.
    fn delete(&self, username: &str) -> Result<bool>;
}

/// SQLite-backed report cache
pub struct SqliteReportCache {
    conn: Mutex<Connection>,
}

impl SqliteReportCache {
    /// Open (creating if needed) the cache file and run migrations
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    /// Open an in-memory cache (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let cache = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        cache.migrate()?;
        Ok(cache)
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        schema::run_migrations(&*self.connection()?)
    }

    /// Remove every expired row, returning how many were dropped
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.connection()?;
        let removed = conn.execute(
            "DELETE FROM reports WHERE expires_at <= ?1",
            params![now.timestamp()],
        )?;
        Ok(removed)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("report cache lock poisoned".to_string()))
    }
}

impl ReportCache for SqliteReportCache {
    fn get(&self, username: &str, now: DateTime<Utc>) -> Result<Option<Report>> {
        let conn = self.connection()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM reports WHERE username = ?1 AND expires_at > ?2",
                params![username, now.timestamp()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put(&self, username: &str, report: &Report, ttl: Duration, now: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_string(report)?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(ttl_secs);

        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM reports WHERE expires_at <= ?1",
            params![now.timestamp()],
        )?;
        conn.execute(
            "INSERT INTO reports (username, payload, stored_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(username) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at,
                expires_at = excluded.expires_at",
            params![username, payload, now.timestamp(), expires_at],
        )?;

        tracing::debug!(username, expires_at, "Cached report");
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<bool> {
        let conn = self.connection()?;
        let removed = conn.execute("DELETE FROM reports WHERE username = ?1", params![username])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{Aggregate, Report};
    use crate::types::Channel;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn report(title: &str) -> Report {
        let channel = Channel {
            id: 1,
            access_hash: 2,
            title: title.to_string(),
            username: "rustlang".to_string(),
            has_photo: false,
        };
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        Report::assemble(&channel, None, Aggregate::default(), at, at)
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_put_then_get() {
        let cache = SqliteReportCache::open_in_memory().unwrap();
        let stored = report("Rust");
        cache
            .put("rustlang", &stored, Duration::from_secs(3600), noon())
            .unwrap();

        let loaded = cache.get("rustlang", noon()).unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert!(cache.get("golang", noon()).unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let cache = SqliteReportCache::open_in_memory().unwrap();
        cache
            .put("rustlang", &report("Rust"), Duration::from_secs(3600), noon())
            .unwrap();

        let later = noon() + chrono::Duration::hours(2);
        assert!(cache.get("rustlang", later).unwrap().is_none());
        assert_eq!(cache.purge_expired(later).unwrap(), 1);
    }

    #[test]
    fn test_put_replaces_and_delete_removes() {
        let cache = SqliteReportCache::open_in_memory().unwrap();
        let ttl = Duration::from_secs(3600);
        cache.put("rustlang", &report("Old"), ttl, noon()).unwrap();
        cache.put("rustlang", &report("New"), ttl, noon()).unwrap();

        let loaded = cache.get("rustlang", noon()).unwrap().unwrap();
        assert_eq!(loaded.channel_name, "New");

        assert!(cache.delete("rustlang").unwrap());
        assert!(!cache.delete("rustlang").unwrap());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/reports.db");
        let cache = SqliteReportCache::open(&path).unwrap();
        cache
            .put("rustlang", &report("Rust"), Duration::from_secs(60), noon())
            .unwrap();
        drop(cache);

        let reopened = SqliteReportCache::open(&path).unwrap();
        assert!(reopened.get("rustlang", noon()).unwrap().is_some());
    }
}

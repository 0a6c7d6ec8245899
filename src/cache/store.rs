//! The file-backed cache metadata store.
//!
//! Schema and table name are carried over verbatim from the original
//! `HttpCacheDatabaseOpenHelper`. All access is serialized behind a single
//! `Mutex<rusqlite::Connection>`: this spec calls for a single-writer store,
//! and `rusqlite::Connection` is `!Sync`, so a mutex is both required and
//! sufficient (no reader/writer split).

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    cache::record::CacheRecord,
    constants,
    error::{Error, Result},
};

/// A process-wide key/value table of [`CacheRecord`]s, indexed by cache-key.
pub struct CacheMetadataStore {
    conn: Mutex<Connection>,
}

impl CacheMetadataStore {
    /// Opens (creating if absent) the metadata database at `db_path`.
    pub fn open(db_path: &Path) -> Result<CacheMetadataStore> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::execution("failed to open cache metadata store").with_source(e))?;
        let store = CacheMetadataStore {
            conn: Mutex::new(conn),
        };
        store.on_create()?;
        Ok(store)
    }

    /// Opens an in-memory store, useful for tests that do not need a cache
    /// directory on disk.
    pub fn open_in_memory() -> Result<CacheMetadataStore> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::execution("failed to open cache metadata store").with_source(e))?;
        let store = CacheMetadataStore {
            conn: Mutex::new(conn),
        };
        store.on_create()?;
        Ok(store)
    }

    fn on_create(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cache_key TEXT UNIQUE,
                url TEXT,
                method TEXT,
                status_code INTEGER,
                status_message TEXT,
                response_header_json TEXT,
                response_body_size INTEGER,
                sent_request_at_epoch INTEGER,
                received_response_at_epoch INTEGER,
                created_at_epoch INTEGER,
                last_accessed_at_epoch INTEGER
            );
            PRAGMA user_version = {version};",
            table = constants::DB_TABLE_NAME,
            version = constants::DB_SCHEMA_VERSION,
        ))
        .map_err(|e| Error::execution("failed to create cache_metadata table").with_source(e))?;
        Ok(())
    }

    /// Looks up `cache_key`, bumping `last_accessed_at_epoch` on hit.
    ///
    /// Per the error-propagation policy, a store failure here is swallowed
    /// and demoted to `Ok(None)` (a cache miss) rather than returned as an
    /// error — the caller always falls back to the network.
    pub fn get(&self, cache_key: &str, now_epoch: u64) -> Option<CacheRecord> {
        match self.get_inner(cache_key, now_epoch) {
            Ok(record) => record,
            Err(e) => {
                warn!(%e, cache_key, "cache metadata read failed, treating as miss");
                None
            }
        }
    }

    fn get_inner(&self, cache_key: &str, now_epoch: u64) -> Result<Option<CacheRecord>> {
        let conn = self.conn.lock();
        let table = constants::DB_TABLE_NAME;
        let record = conn
            .query_row(
                &format!(
                    "SELECT cache_key, url, method, status_code, status_message,
                            response_header_json, response_body_size,
                            sent_request_at_epoch, received_response_at_epoch,
                            created_at_epoch, last_accessed_at_epoch
                     FROM {table} WHERE cache_key = ?1"
                ),
                params![cache_key],
                row_to_record,
            )
            .optional()
            .map_err(|e| Error::execution("cache metadata query failed").with_source(e))?;

        if record.is_some() {
            conn.execute(
                &format!("UPDATE {table} SET last_accessed_at_epoch = ?1 WHERE cache_key = ?2"),
                params![now_epoch, cache_key],
            )
            .map_err(|e| Error::execution("cache metadata touch failed").with_source(e))?;
        }
        Ok(record)
    }

    /// Upserts `record` by cache-key.
    ///
    /// A write failure aborts the commit silently (the cache write never
    /// fails the user's request) but is logged.
    pub fn put(&self, record: &CacheRecord) {
        if let Err(e) = self.put_inner(record) {
            warn!(%e, cache_key = %record.cache_key, "cache metadata write failed");
        }
    }

    fn put_inner(&self, record: &CacheRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {table} (
                    cache_key, url, method, status_code, status_message,
                    response_header_json, response_body_size,
                    sent_request_at_epoch, received_response_at_epoch,
                    created_at_epoch, last_accessed_at_epoch
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(cache_key) DO UPDATE SET
                    url = excluded.url,
                    method = excluded.method,
                    status_code = excluded.status_code,
                    status_message = excluded.status_message,
                    response_header_json = excluded.response_header_json,
                    response_body_size = excluded.response_body_size,
                    sent_request_at_epoch = excluded.sent_request_at_epoch,
                    received_response_at_epoch = excluded.received_response_at_epoch,
                    last_accessed_at_epoch = excluded.last_accessed_at_epoch",
                table = constants::DB_TABLE_NAME,
            ),
            params![
                record.cache_key,
                record.url,
                record.method,
                record.status_code,
                record.status_message,
                record.response_header_json,
                record.response_body_size,
                record.sent_request_at_epoch,
                record.received_response_at_epoch,
                record.created_at_epoch,
                record.last_accessed_at_epoch,
            ],
        )
        .map_err(|e| Error::execution("cache metadata upsert failed").with_source(e))?;
        Ok(())
    }

    /// Removes the row for `cache_key`. The caller remains responsible for
    /// deleting the associated payload file.
    pub fn delete(&self, cache_key: &str) {
        let conn = self.conn.lock();
        let _ = conn.execute(
            &format!(
                "DELETE FROM {} WHERE cache_key = ?1",
                constants::DB_TABLE_NAME
            ),
            params![cache_key],
        );
    }

    /// Sum of `response_body_size` across every committed entry.
    pub fn total_size(&self) -> u64 {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT COALESCE(SUM(response_body_size), 0) FROM {}", constants::DB_TABLE_NAME),
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .unwrap_or(0)
    }

    /// Returns every cache-key ordered by `last_accessed_at_epoch` ascending
    /// (least-recently-used first), driving eviction.
    pub fn enumerate_lru(&self) -> Vec<String> {
        let conn = self.conn.lock();
        let Ok(mut stmt) = conn.prepare(&format!(
            "SELECT cache_key FROM {} ORDER BY last_accessed_at_epoch ASC",
            constants::DB_TABLE_NAME
        )) else {
            return Vec::new();
        };
        let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(0)) else {
            return Vec::new();
        };
        rows.filter_map(std::result::Result::ok).collect()
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheRecord> {
    Ok(CacheRecord {
        cache_key: row.get(0)?,
        url: row.get(1)?,
        method: row.get(2)?,
        status_code: row.get::<_, i64>(3)? as u16,
        status_message: row.get(4)?,
        response_header_json: row.get(5)?,
        response_body_size: row.get::<_, i64>(6)? as u64,
        sent_request_at_epoch: row.get::<_, i64>(7)? as u64,
        received_response_at_epoch: row.get::<_, i64>(8)? as u64,
        created_at_epoch: row.get::<_, i64>(9)? as u64,
        last_accessed_at_epoch: row.get::<_, i64>(10)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cache_key: &str, last_accessed: u64) -> CacheRecord {
        CacheRecord {
            cache_key: cache_key.to_string(),
            url: "http://127.0.0.1:9000/path".to_string(),
            method: "GET".to_string(),
            status_code: 200,
            status_message: "OK".to_string(),
            response_header_json: "{}".to_string(),
            response_body_size: 5,
            sent_request_at_epoch: 1,
            received_response_at_epoch: 2,
            created_at_epoch: 2,
            last_accessed_at_epoch: last_accessed,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        store.put(&sample("key-a", 10));
        let got = store.get("key-a", 11).expect("present");
        assert_eq!(got.status_code, 200);
        assert_eq!(got.cache_key, "key-a");
    }

    #[test]
    fn get_touches_last_accessed() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        store.put(&sample("key-a", 10));
        store.get("key-a", 99).expect("present");
        let got = store.get("key-a", 99).expect("present");
        assert_eq!(got.last_accessed_at_epoch, 99);
    }

    #[test]
    fn put_upserts_by_cache_key() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        store.put(&sample("key-a", 10));
        let mut second = sample("key-a", 20);
        second.status_code = 304;
        store.put(&second);

        let got = store.get("key-a", 20).expect("present");
        assert_eq!(got.status_code, 304);
    }

    #[test]
    fn delete_removes_the_row() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        store.put(&sample("key-a", 10));
        store.delete("key-a");
        assert!(store.get("key-a", 11).is_none());
    }

    #[test]
    fn enumerate_lru_orders_ascending() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        store.put(&sample("newest", 30));
        store.put(&sample("oldest", 10));
        store.put(&sample("middle", 20));

        assert_eq!(store.enumerate_lru(), vec!["oldest", "middle", "newest"]);
    }

    #[test]
    fn total_size_sums_response_body_sizes() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        assert_eq!(store.total_size(), 0);
        store.put(&sample("a", 10));
        store.put(&sample("b", 20));
        assert_eq!(store.total_size(), 10);
    }

    #[test]
    fn missing_key_is_a_miss_not_an_error() {
        let store = CacheMetadataStore::open_in_memory().unwrap();
        assert!(store.get("absent", 0).is_none());
    }
}

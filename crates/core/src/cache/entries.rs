//! Stored entry operations.
//!
//! A stored entry is an immutable response snapshot keyed by request
//! identity within one versioned store. Entries are never mutated in place;
//! put uses UPSERT semantics so an update is an insert that replaces the
//! prior entry for that key.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached response snapshot.
///
/// Captures everything needed to replay a response for the request
/// identified by `key`: status, content type, headers, and body bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheDb {
    /// Insert or replace an entry in a versioned store.
    ///
    /// The owning store must exist; the foreign key constraint rejects
    /// entries for unknown tags.
    pub async fn put_entry(&self, tag: &str, entry: &StoredEntry) -> Result<(), Error> {
        let tag = tag.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        store_tag, key, method, url, status_code,
                        content_type, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(store_tag, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status_code = excluded.status_code,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        tag,
                        &entry.key,
                        &entry.method,
                        &entry.url,
                        entry.status_code as i64,
                        &entry.content_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by request identity from one versioned store.
    ///
    /// Returns None if the store has no entry for the key.
    pub async fn get_entry(&self, tag: &str, key: &str) -> Result<Option<StoredEntry>, Error> {
        let tag = tag.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status_code, content_type,
                            headers_json, body, stored_at
                     FROM entries WHERE store_tag = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![tag, key], |row| {
                    Ok(StoredEntry {
                        key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status_code: row.get::<_, i64>(3)? as u16,
                        content_type: row.get(4)?,
                        headers_json: row.get(5)?,
                        body: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Count the entries held by one versioned store.
    pub async fn entry_count(&self, tag: &str) -> Result<u64, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE store_tag = ?1",
                    params![tag],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

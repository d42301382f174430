//! Versioned store bookkeeping.
//!
//! Each deployment version owns one named store. Stores are created at
//! install time, promoted to active at activation time, and deleted when a
//! newer version activates. At most one store is active at a time.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Create the store for a version tag if it doesn't exist yet.
    ///
    /// Newly created stores are inactive; only [`CacheDb::set_active_store`]
    /// marks a store active.
    pub async fn open_or_create_store(&self, tag: &str) -> Result<(), Error> {
        if tag.is_empty() {
            return Err(Error::InvalidInput("version tag must not be empty".to_string()));
        }
        let tag = tag.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (tag, active, created_at) VALUES (?1, 0, ?2)",
                    params![tag, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Enumerate every existing store tag, oldest first.
    pub async fn list_stores(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT tag FROM stores ORDER BY created_at ASC, tag ASC")?;
                let tags = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(tags)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns true if a store row was removed. Entries go with the store
    /// via the ON DELETE CASCADE constraint.
    pub async fn delete_store(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM stores WHERE tag = ?1", params![tag])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Get the tag of the active store, if any.
    pub async fn active_store(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT tag FROM stores WHERE active = 1", [], |row| {
                    row.get::<_, String>(0)
                });
                match result {
                    Ok(tag) => Ok(Some(tag)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Mark one store active and every other store inactive.
    ///
    /// The single UPDATE keeps "at most one active store" true no matter
    /// what state the table was in. Fails if the tag has no store.
    pub async fn set_active_store(&self, tag: &str) -> Result<(), Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM stores WHERE tag = ?1)",
                    params![tag],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::StoreMissing(tag.clone()));
                }
                conn.execute("UPDATE stores SET active = (tag = ?1)", params![tag])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_or_create_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_or_create_store("v1").await.unwrap();
        db.open_or_create_store("v1").await.unwrap();
        assert_eq!(db.list_stores().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_open_or_create_rejects_empty_tag() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.open_or_create_store("").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_or_create_store("v1").await.unwrap();
        assert!(db.delete_store("v1").await.unwrap());
        assert!(!db.delete_store("v1").await.unwrap());
        assert!(db.list_stores().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_store_starts_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_or_create_store("v1").await.unwrap();
        assert_eq!(db.active_store().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_active_store_is_exclusive() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_or_create_store("v1").await.unwrap();
        db.open_or_create_store("v2").await.unwrap();

        db.set_active_store("v1").await.unwrap();
        assert_eq!(db.active_store().await.unwrap(), Some("v1".to_string()));

        db.set_active_store("v2").await.unwrap();
        assert_eq!(db.active_store().await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_set_active_store_unknown_tag() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.set_active_store("v9").await;
        assert!(matches!(result, Err(Error::StoreMissing(tag)) if tag == "v9"));
    }
}

use super::{epoch_millis, KvStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// SQLite-backed store with a single `kv` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `db_path`. `":memory:"` gives a
    /// private in-memory database.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open SQLite database at {}", db_path))?;
        if db_path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create kv table")?;

        info!("SQLite store ready at {}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let raw: Option<String> = conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")?
            .query_row(params![key], |row| row.get(0))
            .optional()?;

        match raw {
            Some(text) => Ok(Some(
                serde_json::from_str(&text)
                    .with_context(|| format!("Corrupt JSON stored under '{}'", key))?,
            )),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let text = serde_json::to_string(&value)?;
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.prepare_cached(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )?
        .execute(params![key, text, epoch_millis() as i64])?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
        for key in keys {
            stmt.execute(params![key])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_roundtrip_and_remove() {
        let store = SqliteStore::open(":memory:").unwrap();

        assert!(store.get("missing").await.unwrap().is_none());

        store
            .set("linkStatusCache", json!({"https://a.test": {"result": "live", "timestamp": 1}}))
            .await
            .unwrap();
        store.set("blocklistLastUpdate", json!(42)).await.unwrap();
        store.set("blocklistLastUpdate", json!(43)).await.unwrap();

        let cache = store.get("linkStatusCache").await.unwrap().unwrap();
        assert_eq!(cache["https://a.test"]["result"], "live");
        assert_eq!(store.get("blocklistLastUpdate").await.unwrap(), Some(json!(43)));

        store
            .remove(&["linkStatusCache", "blocklistLastUpdate"])
            .await
            .unwrap();
        assert!(store.get("linkStatusCache").await.unwrap().is_none());
        assert!(store.get("blocklistLastUpdate").await.unwrap().is_none());
    }
}

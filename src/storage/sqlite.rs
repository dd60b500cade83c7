use super::KeyValueStore;
use crate::errors::{CoreError, CoreResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS kv_entries (
  key TEXT PRIMARY KEY,
  value_json TEXT NOT NULL,
  updated_at TEXT NOT NULL
);";

/// Durable key-value backend over a single-table sqlite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| CoreError::Storage(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(CoreError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(CoreError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = conn
            .query_row(
                "SELECT value_json FROM kv_entries WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional();
        match result {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, error = %error, "kv read failed");
                None
            }
        }
    }

    fn set_raw(&self, key: &str, value: &str) {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = conn.execute(
            "INSERT INTO kv_entries (key, value_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        );
        if let Err(error) = result {
            tracing::warn!(key, error = %error, "kv write failed");
        }
    }

    fn remove(&self, key: &str) {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(error) = conn.execute("DELETE FROM kv_entries WHERE key = ?1", [key]) {
            tracing::warn!(key, error = %error, "kv delete failed");
        }
    }
}

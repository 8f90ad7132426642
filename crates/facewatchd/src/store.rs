//! Append-only SQLite detection log.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Timestamp format of the `timestamp` column.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS face_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    timestamp TEXT
)";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot create database directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One persisted detection row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionEvent {
    pub id: i64,
    pub name: String,
    pub timestamp: String,
}

/// Single-writer handle on the detection log.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open (or create) the log at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let store = Self { conn: Connection::open(path)? };
        store.ensure_schema()?;
        tracing::info!(path = %path.display(), "opened detection log");
        Ok(store)
    }

    /// Create the `face_logs` table if absent. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Append one detection and return its row id.
    pub fn append(&self, name: &str, timestamp: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO face_logs (name, timestamp) VALUES (?1, ?2)",
            params![name, timestamp],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent `limit` detections, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<DetectionEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, timestamp FROM face_logs ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(DetectionEvent {
                id: row.get(0)?,
                name: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Total number of logged detections.
    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM face_logs", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

#[cfg(test)]
impl EventStore {
    /// In-memory log, gone when dropped.
    pub(crate) fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self { conn: Connection::open_in_memory()? };
        store.ensure_schema()?;
        Ok(store)
    }

    pub(crate) fn execute_for_test(&self, sql: &str) {
        self.conn.execute_batch(sql).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(store: &EventStore) -> i64 {
        store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'face_logs'",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database").join("faces.db");

        let store = EventStore::open(&path).unwrap();
        store.append("alice", "2024-01-01 10:00:00").unwrap();
        store.ensure_schema().unwrap();
        store.close().unwrap();

        let reopened = EventStore::open(&path).unwrap();
        assert_eq!(table_count(&reopened), 1);
        assert_eq!(reopened.count().unwrap(), 1, "existing rows survive reopening");
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let store = EventStore::open_in_memory().unwrap();
        let first = store.append("alice", "2024-01-01 10:00:00").unwrap();
        let second = store.append("Unknown", "2024-01-01 10:00:01").unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_recent_newest_first() {
        let store = EventStore::open_in_memory().unwrap();
        let rows = [
            ("a", "2024-01-01 10:00:00"),
            ("b", "2024-01-01 10:00:01"),
            ("c", "2024-01-01 10:00:02"),
        ];
        for (name, ts) in rows {
            store.append(name, ts).unwrap();
        }

        let recent = store.recent(2).unwrap();
        let names: Vec<&str> = recent.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
        assert_eq!(recent[0].timestamp, "2024-01-01 10:00:02");
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_repeated_identical_rows_are_kept() {
        let store = EventStore::open_in_memory().unwrap();
        store.append("alice", "2024-01-01 10:00:00").unwrap();
        store.append("alice", "2024-01-01 10:00:00").unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }
}

//! SQLite-backed store for agent records.
//!
//! For standalone simulations that want durable records without a host save
//! format. Each record is stored as JSON text keyed by agent id.

#![cfg(feature = "sqlite")]

use crate::record::AgentRecord;
use ecotope_core::component::Blob;
use ecotope_core::error::{EcotopeError, PersistenceError, Result};
use ecotope_core::types::AgentId;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

fn db_error(e: impl std::fmt::Display) -> EcotopeError {
    PersistenceError::Database(e.to_string()).into()
}

/// Agent records in a SQLite table.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Create a new in-memory store.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::init_with_connection(conn)
    }

    /// Create or open a file-backed store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS agent_records (
                id TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(db_error)
    }

    /// Insert or replace the record of `id`.
    pub fn put(&self, id: AgentId, record: &AgentRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO agent_records (id, record) VALUES (?1, ?2)",
                params![id.to_string(), json],
            )
            .map_err(db_error)?;
        Ok(())
    }

    pub fn get(&self, id: AgentId) -> Result<Option<AgentRecord>> {
        let json: Option<String> = self
            .lock()?
            .query_row(
                "SELECT record FROM agent_records WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        let Some(json) = json else {
            return Ok(None);
        };
        let value: Blob =
            serde_json::from_str(&json).map_err(|e| EcotopeError::corrupt(format!("record of {id}: {e}")))?;
        AgentRecord::decode(value).map(Some)
    }

    pub fn remove(&self, id: AgentId) -> Result<bool> {
        let removed = self
            .lock()?
            .execute("DELETE FROM agent_records WHERE id = ?1", params![id.to_string()])
            .map_err(db_error)?;
        Ok(removed > 0)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM agent_records", [], |row| row.get(0))
            .map_err(db_error)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::component::SimulatedTime;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(hunger: i32) -> AgentRecord {
        let mut handles = BTreeMap::new();
        handles.insert("hunger".to_string(), json!({ "hunger": hunger }));
        AgentRecord::new(handles, SimulatedTime::default(), BTreeMap::new())
    }

    #[test]
    fn put_get_remove() {
        let store = SqliteRecordStore::new_in_memory().unwrap();
        let id = AgentId::from_seed(1);
        assert_eq!(store.get(id).unwrap(), None);

        store.put(id, &record(40)).unwrap();
        store.put(id, &record(55)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(id).unwrap(), Some(record(55)));

        assert!(store.remove(id).unwrap());
        assert!(!store.remove(id).unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn newer_records_are_rejected_on_read() {
        let store = SqliteRecordStore::new_in_memory().unwrap();
        let id = AgentId::from_seed(3);
        let newer = json!({ "version": crate::record::RECORD_VERSION + 1, "handles": {} });
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO agent_records (id, record) VALUES (?1, ?2)",
                params![id.to_string(), newer.to_string()],
            )
            .unwrap();
        assert!(matches!(
            store.get(id),
            Err(EcotopeError::Persistence(PersistenceError::VersionMismatch { .. }))
        ));
    }

    #[test]
    fn file_backed_records_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let id = AgentId::from_seed(2);
        SqliteRecordStore::open(&path).unwrap().put(id, &record(12)).unwrap();
        let reopened = SqliteRecordStore::open(&path).unwrap();
        assert_eq!(reopened.get(id).unwrap(), Some(record(12)));
    }
}

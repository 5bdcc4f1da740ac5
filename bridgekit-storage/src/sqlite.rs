//! SQLite-backed document engine.
//!
//! One row per entry. The local and remote ids get their own indexed columns
//! so lookups never scan property JSON.

use crate::document::{DocumentStore, EntryFilter};
use crate::error::{StorageError, StorageResult};
use bridgekit_model::{Entity, Entry};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const ENTRY_COLUMNS: &str = "id, local_id, local_props, remote_id, remote_props, data";

/// Upper bound on bound parameters per `IN (...)` query.
const MAX_BATCH_PARAMS: usize = 500;

/// Persistent document store backed by SQLite.
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened entry store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                local_id TEXT NOT NULL,
                local_props TEXT NOT NULL,
                remote_id TEXT NOT NULL,
                remote_props TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_local_id ON entries(local_id);
            CREATE INDEX IF NOT EXISTS idx_entries_remote_id ON entries(remote_id);
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("entry store connection: {e}")))
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> StorageResult<Vec<Entry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RawEntry::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawEntry::into_entry).collect()
    }

    fn query_in(&self, column: &str, ids: &[String]) -> StorageResult<Vec<Entry>> {
        let mut entries = Vec::new();
        for chunk in ids.chunks(MAX_BATCH_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql =
                format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE {column} IN ({placeholders})");
            entries.extend(self.query(&sql, params_from_iter(chunk.iter()))?);
        }
        Ok(entries)
    }

    fn select(&self, filter: &EntryFilter<'_>, limit: Option<usize>) -> StorageResult<Vec<Entry>> {
        let (column, key) = match filter {
            EntryFilter::Id(id) => ("id", *id),
            EntryFilter::LocalId(id) => ("local_id", *id),
            EntryFilter::RemoteId(id) => ("remote_id", *id),
            EntryFilter::LocalIds(ids) => return self.query_in("local_id", ids),
            EntryFilter::RemoteIds(ids) => return self.query_in("remote_id", ids),
        };
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE {column} = ?1");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.query(&sql, params![key])
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn upsert(&self, entry: &Entry) -> StorageResult<()> {
        let local_props = serde_json::to_string(entry.local.properties())?;
        let remote_props = serde_json::to_string(entry.remote.properties())?;
        let data = serde_json::to_string(&entry.data)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO entries (id, local_id, local_props, remote_id, remote_props, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.local_id(),
                local_props,
                entry.remote_id(),
                remote_props,
                data,
            ],
        )?;
        Ok(())
    }

    fn find_one(&self, filter: &EntryFilter<'_>) -> StorageResult<Option<Entry>> {
        Ok(self.select(filter, Some(1))?.into_iter().next())
    }

    fn find_many(&self, filter: &EntryFilter<'_>) -> StorageResult<Vec<Entry>> {
        self.select(filter, None)
    }

    fn count(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// A row as stored, before the JSON columns are decoded.
struct RawEntry {
    id: String,
    local_id: String,
    local_props: String,
    remote_id: String,
    remote_props: String,
    data: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            local_id: row.get(1)?,
            local_props: row.get(2)?,
            remote_id: row.get(3)?,
            remote_props: row.get(4)?,
            data: row.get(5)?,
        })
    }

    fn decode<T: DeserializeOwned>(&self, column: &str, raw: &str) -> StorageResult<T> {
        serde_json::from_str(raw)
            .map_err(|e| StorageError::InvalidData(format!("entry {}: {column}: {e}", self.id)))
    }

    fn into_entry(self) -> StorageResult<Entry> {
        let local_props: Map<String, Value> = self.decode("local properties", &self.local_props)?;
        let remote_props: Map<String, Value> =
            self.decode("remote properties", &self.remote_props)?;
        let data: Value = self.decode("data", &self.data)?;
        Ok(Entry::new(
            self.id,
            Entity::with_properties(self.local_id, local_props),
            Entity::with_properties(self.remote_id, remote_props),
            data,
        ))
    }
}

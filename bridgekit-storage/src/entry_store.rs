//! The linked-entity store.

use crate::document::{DocumentStore, EntryFilter};
use crate::error::StorageResult;
use crate::location::StoreLocation;
use crate::memory::MemoryDocumentStore;
use crate::sqlite::SqliteDocumentStore;
use bridgekit_model::{Entity, Entry};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Persists [`Entry`] links and answers indexed lookups over them.
///
/// Storage failures are returned to the caller as-is and never retried.
/// A lookup that matches nothing yields `None` or an empty collection.
#[derive(Clone)]
pub struct EntryStore {
    docs: Arc<dyn DocumentStore>,
}

impl EntryStore {
    /// Opens (or creates) a SQLite-backed store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::with_backend(Arc::new(SqliteDocumentStore::open(path)?)))
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::with_backend(Arc::new(
            SqliteDocumentStore::open_in_memory()?,
        )))
    }

    /// Opens a store at `location`.
    pub fn open_location(location: &StoreLocation) -> StorageResult<Self> {
        match location {
            StoreLocation::File(path) => Self::open(path),
            StoreLocation::InMemory => Self::open_in_memory(),
        }
    }

    /// Creates a store over the pure in-memory engine.
    pub fn in_memory_map() -> Self {
        Self::with_backend(Arc::new(MemoryDocumentStore::new()))
    }

    /// Creates a store over any document engine.
    pub fn with_backend(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Inserts `entry`, or replaces the local, remote and data of the entry
    /// sharing its id. Nothing is merged.
    pub fn upsert_entry(&self, entry: &Entry) -> StorageResult<()> {
        debug!(
            "Upserting entry {} ({} <-> {})",
            entry.id,
            entry.local_id(),
            entry.remote_id()
        );
        self.docs.upsert(entry)
    }

    /// Links `local` and `remote`, persisting and returning the new entry.
    ///
    /// Without an explicit `id` the entry id is derived from the pair (see
    /// [`bridgekit_model::link_id`]), so linking the same pair twice replaces
    /// the first entry instead of adding a second one.
    pub fn link(
        &self,
        local: Entity,
        remote: Entity,
        data: Value,
        id: Option<&str>,
    ) -> StorageResult<Entry> {
        let entry = match id {
            Some(id) => Entry::new(id, local, remote, data),
            None => Entry::linked(local, remote, data),
        };
        self.upsert_entry(&entry)?;
        Ok(entry)
    }

    // ── Lookups ──────────────────────────────────────────────────

    /// Returns the entry whose primary key is `id`.
    ///
    /// Only the primary key is consulted; an id that happens to equal some
    /// entry's local or remote id does not match that entry.
    pub fn get_entry_by_id(&self, id: &str) -> StorageResult<Option<Entry>> {
        self.docs.find_one(&EntryFilter::Id(id))
    }

    /// Returns every entry linked to the local entity `local_id`.
    pub fn get_entries_by_local_id(&self, local_id: &str) -> StorageResult<Vec<Entry>> {
        self.docs.find_many(&EntryFilter::LocalId(local_id))
    }

    /// Returns every entry linked to the remote entity `remote_id`.
    pub fn get_entries_by_remote_id(&self, remote_id: &str) -> StorageResult<Vec<Entry>> {
        self.docs.find_many(&EntryFilter::RemoteId(remote_id))
    }

    /// Groups the entries of several local entities by local id.
    ///
    /// Every queried id is a key of the result; ids without links map to an
    /// empty `Vec`.
    pub fn get_entries_by_local_ids<S: AsRef<str>>(
        &self,
        local_ids: &[S],
    ) -> StorageResult<HashMap<String, Vec<Entry>>> {
        let ids = distinct(local_ids);
        debug!("Batch lookup of {} local ids", ids.len());
        let matches = if ids.is_empty() {
            Vec::new()
        } else {
            self.docs.find_many(&EntryFilter::LocalIds(&ids))?
        };
        Ok(group(ids, matches, |entry| entry.local_id()))
    }

    /// Remote-side counterpart of [`get_entries_by_local_ids`](Self::get_entries_by_local_ids).
    pub fn get_entries_by_remote_ids<S: AsRef<str>>(
        &self,
        remote_ids: &[S],
    ) -> StorageResult<HashMap<String, Vec<Entry>>> {
        let ids = distinct(remote_ids);
        debug!("Batch lookup of {} remote ids", ids.len());
        let matches = if ids.is_empty() {
            Vec::new()
        } else {
            self.docs.find_many(&EntryFilter::RemoteIds(&ids))?
        };
        Ok(group(ids, matches, |entry| entry.remote_id()))
    }

    /// Sorted, distinct remote ids linked to `local_id`.
    pub fn get_linked_remote_ids(&self, local_id: &str) -> StorageResult<Vec<String>> {
        let ids: BTreeSet<String> = self
            .get_entries_by_local_id(local_id)?
            .into_iter()
            .map(|entry| entry.remote.id().to_string())
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Sorted, distinct local ids linked to `remote_id`.
    pub fn get_linked_local_ids(&self, remote_id: &str) -> StorageResult<Vec<String>> {
        let ids: BTreeSet<String> = self
            .get_entries_by_remote_id(remote_id)?
            .into_iter()
            .map(|entry| entry.local.id().to_string())
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Number of stored entries.
    pub fn count(&self) -> StorageResult<usize> {
        self.docs.count()
    }
}

/// Input ids with duplicates dropped, first occurrence wins.
fn distinct<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    ids.iter()
        .map(|id| id.as_ref())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn group(
    keys: Vec<String>,
    entries: Vec<Entry>,
    key_of: impl Fn(&Entry) -> &str,
) -> HashMap<String, Vec<Entry>> {
    let mut grouped: HashMap<String, Vec<Entry>> =
        keys.into_iter().map(|key| (key, Vec::new())).collect();
    for entry in entries {
        if let Some(bucket) = grouped.get_mut(key_of(&entry)) {
            bucket.push(entry);
        }
    }
    grouped
}

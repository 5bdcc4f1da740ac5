//! In-memory document engine with secondary indexes on local and remote ids.

use crate::document::{DocumentStore, EntryFilter};
use crate::error::{StorageError, StorageResult};
use bridgekit_model::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    entries: HashMap<String, Entry>,
    by_local: HashMap<String, BTreeSet<String>>,
    by_remote: HashMap<String, BTreeSet<String>>,
}

impl Tables {
    fn index(&mut self, entry: &Entry) {
        self.by_local
            .entry(entry.local_id().to_string())
            .or_default()
            .insert(entry.id.clone());
        self.by_remote
            .entry(entry.remote_id().to_string())
            .or_default()
            .insert(entry.id.clone());
    }

    fn unindex(&mut self, entry: &Entry) {
        remove_from_index(&mut self.by_local, entry.local_id(), &entry.id);
        remove_from_index(&mut self.by_remote, entry.remote_id(), &entry.id);
    }

    fn collect<'a>(
        &self,
        index: &HashMap<String, BTreeSet<String>>,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Entry> {
        let mut ids = BTreeSet::new();
        for key in keys {
            if let Some(set) = index.get(key) {
                ids.extend(set.iter());
            }
        }
        ids.into_iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }
}

fn remove_from_index(index: &mut HashMap<String, BTreeSet<String>>, key: &str, id: &str) {
    if let Some(set) = index.get_mut(key) {
        set.remove(id);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

/// A document store that lives entirely in process memory.
///
/// Useful for tests and for bridges that rebuild their links on startup.
#[derive(Default)]
pub struct MemoryDocumentStore {
    tables: RwLock<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StorageError::LockPoisoned(format!("memory store: {e}")))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StorageError::LockPoisoned(format!("memory store: {e}")))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn upsert(&self, entry: &Entry) -> StorageResult<()> {
        let mut tables = self.write()?;
        if let Some(previous) = tables.entries.remove(&entry.id) {
            tables.unindex(&previous);
        }
        tables.index(entry);
        tables.entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn find_one(&self, filter: &EntryFilter<'_>) -> StorageResult<Option<Entry>> {
        if let EntryFilter::Id(id) = filter {
            return Ok(self.read()?.entries.get(*id).cloned());
        }
        Ok(self.find_many(filter)?.into_iter().next())
    }

    fn find_many(&self, filter: &EntryFilter<'_>) -> StorageResult<Vec<Entry>> {
        let tables = self.read()?;
        let entries: Vec<Entry> = match filter {
            EntryFilter::Id(id) => tables.entries.get(*id).cloned().into_iter().collect(),
            EntryFilter::LocalId(id) => tables.collect(&tables.by_local, [*id]),
            EntryFilter::RemoteId(id) => tables.collect(&tables.by_remote, [*id]),
            EntryFilter::LocalIds(ids) => {
                tables.collect(&tables.by_local, ids.iter().map(String::as_str))
            }
            EntryFilter::RemoteIds(ids) => {
                tables.collect(&tables.by_remote, ids.iter().map(String::as_str))
            }
        };
        Ok(entries)
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.read()?.entries.len())
    }
}

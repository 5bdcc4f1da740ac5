//! The persistence collaborator consumed by [`EntryStore`](crate::EntryStore).
//!
//! Engines only need to offer keyed upsert and lookups by a closed set of
//! filters. Anything richer belongs outside the store.

use crate::error::StorageResult;
use bridgekit_model::Entry;

/// The lookups an engine must support. There are no arbitrary predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter<'a> {
    /// Primary key match. Never compared with local or remote ids.
    Id(&'a str),
    LocalId(&'a str),
    RemoteId(&'a str),
    LocalIds(&'a [String]),
    RemoteIds(&'a [String]),
}

impl EntryFilter<'_> {
    /// Whether `entry` satisfies this filter.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::Id(id) => entry.id == *id,
            Self::LocalId(id) => entry.local_id() == *id,
            Self::RemoteId(id) => entry.remote_id() == *id,
            Self::LocalIds(ids) => ids.iter().any(|id| id == entry.local_id()),
            Self::RemoteIds(ids) => ids.iter().any(|id| id == entry.remote_id()),
        }
    }
}

/// An embedded document engine holding one document per entry.
///
/// Implementations must make `upsert` atomic per primary key: a reader sees
/// either the previous entry or the new one, never a mix of both.
pub trait DocumentStore: Send + Sync {
    /// Inserts `entry`, or replaces every field of the entry with the same id.
    fn upsert(&self, entry: &Entry) -> StorageResult<()>;

    /// Returns one entry matching `filter`, if any.
    fn find_one(&self, filter: &EntryFilter<'_>) -> StorageResult<Option<Entry>>;

    /// Returns all entries matching `filter` in no particular order.
    fn find_many(&self, filter: &EntryFilter<'_>) -> StorageResult<Vec<Entry>>;

    /// Number of stored entries.
    fn count(&self) -> StorageResult<usize>;
}

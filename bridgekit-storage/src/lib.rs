//! Linked-entity storage for bridgekit.
//!
//! Persists [`Entry`](bridgekit_model::Entry) links between local and remote
//! entities and serves the lookups a bridge needs: by entry id, by local id,
//! by remote id, and batched by several local or remote ids.
//!
//! # Architecture
//!
//! - [`EntryStore`] owns the lookup semantics (namespace separation, batch
//!   grouping, link id derivation)
//! - [`DocumentStore`] is the engine seam: keyed upsert plus find-one and
//!   find-many over a closed set of [`EntryFilter`]s
//! - [`SqliteDocumentStore`] persists to a file or to memory;
//!   [`MemoryDocumentStore`] keeps hash indexes in process

mod document;
mod entry_store;
mod error;
mod location;
mod memory;
mod sqlite;

pub use document::{DocumentStore, EntryFilter};
pub use entry_store::EntryStore;
pub use error::{StorageError, StorageResult};
pub use location::{StoreLocation, IN_MEMORY};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

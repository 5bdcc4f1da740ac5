use crate::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Namespace for ids derived by [`link_id`].
const LINK_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c2e_9a4d_4f57_b8e0_2d71_c5a9_e413);

/// A persisted link between a local entity and a remote entity.
///
/// `id` is the primary key and lives in its own namespace: it is never
/// compared against `local.id` or `remote.id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub local: Entity,
    pub remote: Entity,
    #[serde(default)]
    pub data: Value,
}

impl Entry {
    pub fn new(id: impl Into<String>, local: Entity, remote: Entity, data: Value) -> Self {
        Self {
            id: id.into(),
            local,
            remote,
            data,
        }
    }

    /// Builds an entry whose id is derived from the linked pair.
    pub fn linked(local: Entity, remote: Entity, data: Value) -> Self {
        let id = link_id(local.id(), remote.id());
        Self::new(id, local, remote, data)
    }

    pub fn local_id(&self) -> &str {
        self.local.id()
    }

    pub fn remote_id(&self) -> &str {
        self.remote.id()
    }
}

/// Derives a stable entry id for a (local, remote) pair.
///
/// UUID v5 over the length-prefixed pair, so `("a b", "c")` and
/// `("a", "b c")` never collide and the order of the pair matters.
#[must_use]
pub fn link_id(local_id: &str, remote_id: &str) -> String {
    let mut name = Vec::with_capacity(local_id.len() + remote_id.len() + 16);
    name.extend_from_slice(&(local_id.len() as u64).to_be_bytes());
    name.extend_from_slice(local_id.as_bytes());
    name.extend_from_slice(&(remote_id.len() as u64).to_be_bytes());
    name.extend_from_slice(remote_id.as_bytes());
    Uuid::new_v5(&LINK_NAMESPACE, &name).to_string()
}

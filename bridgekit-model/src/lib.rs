//! Core model types for bridgekit.
//!
//! Defines the values shared by the storage layer and the bridging
//! application:
//! - [`Entity`]: an id plus a JSON property bag, used for objects on both
//!   the local and the remote side of a bridge
//! - [`Entry`]: a persisted link between one local and one remote entity,
//!   carrying an opaque JSON payload
//! - [`link_id`]: deterministic entry ids for linked pairs

mod entity;
mod entry;

pub use entity::Entity;
pub use entry::{link_id, Entry};

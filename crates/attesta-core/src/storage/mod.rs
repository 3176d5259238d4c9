//! # Storage Backends
//!
//! Implementations of `AttributeStore`:
//! - `memory` - BTreeMap-backed, deterministic, serializable to a snapshot
//! - `redb_store` - disk-backed ACID store

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::types::AttestaError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Map any storage-layer failure into `AttestaError::StorageError`.
pub(crate) fn storage_err(e: impl std::fmt::Display) -> AttestaError {
    AttestaError::StorageError(e.to_string())
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AttestaError> {
    postcard::to_allocvec(value).map_err(|e| AttestaError::SerializationError(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AttestaError> {
    postcard::from_bytes(bytes).map_err(|e| AttestaError::SerializationError(e.to_string()))
}

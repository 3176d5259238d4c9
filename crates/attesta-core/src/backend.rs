//! # Storage Backend
//!
//! A single `AttributeStore` that is either an in-memory `MemoryStore`
//! (optionally loaded from a snapshot file) or a persistent `RedbStore`.
//! Callers pick the backend once and use the same engine API afterwards.

use crate::formats::{store_from_bytes, store_to_bytes};
use crate::storage::{MemoryStore, RedbStore};
use crate::store::AttributeStore;
use crate::types::{
    AttestaError, AttributeRecord, EntityId, EntityKind, EntityRow, RecordDraft, RecordId,
    Revision, RevisionId, RevisionMeta, Source, SourceDraft, SourceId, VersionEntry, VersionId,
};
use std::path::Path;
use uuid::Uuid;

/// Storage backend chosen at startup.
#[derive(Debug)]
pub enum StorageBackend {
    /// BTreeMap store (fast, volatile unless saved as a snapshot).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone; a redb handle cannot be cloned.

impl StorageBackend {
    /// Open or create a redb database at `path`.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self, AttestaError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Restore an in-memory store from snapshot bytes.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, AttestaError> {
        Ok(Self::InMemory(store_from_bytes(bytes)?))
    }

    /// Snapshot bytes of an in-memory store. `None` for persistent backends,
    /// which need no explicit save.
    pub fn to_snapshot(&self) -> Result<Option<Vec<u8>>, AttestaError> {
        match self {
            Self::InMemory(store) => store_to_bytes(store).map(Some),
            Self::Persistent(_) => Ok(None),
        }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $body:expr) => {
        match $self {
            StorageBackend::InMemory($store) => $body,
            StorageBackend::Persistent($store) => $body,
        }
    };
}

impl AttributeStore for StorageBackend {
    fn insert_entity(&mut self, kind: EntityKind) -> Result<EntityRow, AttestaError> {
        dispatch!(self, s => s.insert_entity(kind))
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<EntityRow>, AttestaError> {
        dispatch!(self, s => s.get_entity(id))
    }

    fn find_entity_by_uuid(&self, uuid: Uuid) -> Result<Option<EntityRow>, AttestaError> {
        dispatch!(self, s => s.find_entity_by_uuid(uuid))
    }

    fn put_entity(&mut self, row: &EntityRow) -> Result<(), AttestaError> {
        dispatch!(self, s => s.put_entity(row))
    }

    fn entities(&self, kind: Option<EntityKind>) -> Result<Vec<EntityRow>, AttestaError> {
        dispatch!(self, s => s.entities(kind))
    }

    fn insert_source(&mut self, draft: SourceDraft) -> Result<Source, AttestaError> {
        dispatch!(self, s => s.insert_source(draft))
    }

    fn get_source(&self, id: SourceId) -> Result<Option<Source>, AttestaError> {
        dispatch!(self, s => s.get_source(id))
    }

    fn insert_record(&mut self, draft: RecordDraft) -> Result<AttributeRecord, AttestaError> {
        dispatch!(self, s => s.insert_record(draft))
    }

    fn put_record(&mut self, record: &AttributeRecord) -> Result<(), AttestaError> {
        dispatch!(self, s => s.put_record(record))
    }

    fn delete_record(&mut self, id: RecordId) -> Result<(), AttestaError> {
        dispatch!(self, s => s.delete_record(id))
    }

    fn get_record(&self, id: RecordId) -> Result<Option<AttributeRecord>, AttestaError> {
        dispatch!(self, s => s.get_record(id))
    }

    fn records(
        &self,
        entity: EntityId,
        field: &str,
    ) -> Result<Vec<AttributeRecord>, AttestaError> {
        dispatch!(self, s => s.records(entity, field))
    }

    fn begin_revision(&mut self, meta: &RevisionMeta) -> Result<Revision, AttestaError> {
        dispatch!(self, s => s.begin_revision(meta))
    }

    fn get_revision(&self, id: RevisionId) -> Result<Option<Revision>, AttestaError> {
        dispatch!(self, s => s.get_revision(id))
    }

    fn append_version(
        &mut self,
        revision: RevisionId,
        record: &AttributeRecord,
    ) -> Result<VersionEntry, AttestaError> {
        dispatch!(self, s => s.append_version(revision, record))
    }

    fn get_version(&self, id: VersionId) -> Result<Option<VersionEntry>, AttestaError> {
        dispatch!(self, s => s.get_version(id))
    }

    fn versions_for_record(&self, record: RecordId) -> Result<Vec<VersionEntry>, AttestaError> {
        dispatch!(self, s => s.versions_for_record(record))
    }

    fn versions_for_entity(&self, entity: EntityId) -> Result<Vec<VersionEntry>, AttestaError> {
        dispatch!(self, s => s.versions_for_entity(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_roundtrip_through_backend() {
        let mut backend = StorageBackend::default();
        let row = backend.insert_entity(EntityKind::Person).expect("insert");

        let bytes = backend
            .to_snapshot()
            .expect("snapshot")
            .expect("in-memory backend");
        let restored = StorageBackend::from_snapshot(&bytes).expect("restore");
        assert_eq!(restored.get_entity(row.id).expect("get"), Some(row));
        assert!(!restored.is_persistent());
    }

    #[test]
    fn persistent_backend_needs_no_snapshot() {
        let temp = tempdir().expect("temp dir");
        let mut backend = StorageBackend::open_redb(temp.path().join("attesta.redb")).expect("open");
        backend
            .insert_source(SourceDraft::new("Reuters"))
            .expect("insert");
        assert!(backend.is_persistent());
        assert!(backend.to_snapshot().expect("snapshot").is_none());
        assert!(backend.get_source(SourceId(1)).expect("get").is_some());
    }
}

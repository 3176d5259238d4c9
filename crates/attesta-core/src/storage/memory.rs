//! # In-Memory Store
//!
//! The deterministic, volatile implementation of `AttributeStore`.
//!
//! All data structures use `BTreeMap` for deterministic ordering. The whole
//! store is serializable so it can be written to a snapshot file (see
//! `formats::persistence`).

use crate::store::AttributeStore;
use crate::types::{
    AttestaError, AttributeRecord, EntityId, EntityKind, EntityRow, RecordDraft, RecordId,
    Revision, RevisionId, RevisionMeta, Source, SourceDraft, SourceId, VersionEntry, VersionId,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// BTreeMap-backed attribute store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    entities: BTreeMap<EntityId, EntityRow>,
    sources: BTreeMap<SourceId, Source>,
    records: BTreeMap<RecordId, AttributeRecord>,

    /// (entity, field model) -> live record ids
    field_index: BTreeMap<(EntityId, String), BTreeSet<RecordId>>,

    revisions: BTreeMap<RevisionId, Revision>,
    versions: BTreeMap<VersionId, VersionEntry>,

    next_entity_id: u64,
    next_source_id: u64,
    next_record_id: u64,
    next_revision_id: u64,
    next_version_id: u64,
}

/// Advance a counter and return the new value. Ids start at 1.
fn allocate(counter: &mut u64) -> u64 {
    *counter = counter.saturating_add(1);
    *counter
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live attribute records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of version snapshots.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Number of revisions.
    #[must_use]
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    /// Number of registered sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl AttributeStore for MemoryStore {
    fn insert_entity(&mut self, kind: EntityKind) -> Result<EntityRow, AttestaError> {
        let row = EntityRow {
            id: EntityId(allocate(&mut self.next_entity_id)),
            uuid: Uuid::new_v4(),
            kind,
            published: false,
        };
        self.entities.insert(row.id, row.clone());
        Ok(row)
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<EntityRow>, AttestaError> {
        Ok(self.entities.get(&id).cloned())
    }

    fn find_entity_by_uuid(&self, uuid: Uuid) -> Result<Option<EntityRow>, AttestaError> {
        Ok(self.entities.values().find(|row| row.uuid == uuid).cloned())
    }

    fn put_entity(&mut self, row: &EntityRow) -> Result<(), AttestaError> {
        match self.entities.get_mut(&row.id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(())
            }
            None => Err(AttestaError::EntityNotFound(row.id)),
        }
    }

    fn entities(&self, kind: Option<EntityKind>) -> Result<Vec<EntityRow>, AttestaError> {
        Ok(self
            .entities
            .values()
            .filter(|row| kind.is_none_or(|k| row.kind == k))
            .cloned()
            .collect())
    }

    fn insert_source(&mut self, draft: SourceDraft) -> Result<Source, AttestaError> {
        let source = Source::from_draft(SourceId(allocate(&mut self.next_source_id)), draft);
        self.sources.insert(source.id, source.clone());
        Ok(source)
    }

    fn get_source(&self, id: SourceId) -> Result<Option<Source>, AttestaError> {
        Ok(self.sources.get(&id).cloned())
    }

    fn insert_record(&mut self, draft: RecordDraft) -> Result<AttributeRecord, AttestaError> {
        if !self.entities.contains_key(&draft.entity) {
            return Err(AttestaError::EntityNotFound(draft.entity));
        }
        let id = RecordId(allocate(&mut self.next_record_id));
        let mut record = AttributeRecord {
            id,
            entity: draft.entity,
            field: draft.field,
            language: None,
            value: None,
            confidence: None,
            sources: BTreeSet::new(),
        };
        record.apply(draft.state);

        self.field_index
            .entry((record.entity, record.field.clone()))
            .or_default()
            .insert(id);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    fn put_record(&mut self, record: &AttributeRecord) -> Result<(), AttestaError> {
        match self.records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(AttestaError::RecordNotFound(record.id)),
        }
    }

    fn delete_record(&mut self, id: RecordId) -> Result<(), AttestaError> {
        let record = self
            .records
            .remove(&id)
            .ok_or(AttestaError::RecordNotFound(id))?;
        if let Some(ids) = self.field_index.get_mut(&(record.entity, record.field)) {
            ids.remove(&id);
        }
        Ok(())
    }

    fn get_record(&self, id: RecordId) -> Result<Option<AttributeRecord>, AttestaError> {
        Ok(self.records.get(&id).cloned())
    }

    fn records(
        &self,
        entity: EntityId,
        field: &str,
    ) -> Result<Vec<AttributeRecord>, AttestaError> {
        let Some(ids) = self.field_index.get(&(entity, field.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id))
            .cloned()
            .collect())
    }

    fn begin_revision(&mut self, meta: &RevisionMeta) -> Result<Revision, AttestaError> {
        let revision = Revision {
            id: RevisionId(allocate(&mut self.next_revision_id)),
            created_at: Utc::now(),
            editor: meta.editor.clone(),
            comment: meta.comment.clone(),
        };
        self.revisions.insert(revision.id, revision.clone());
        Ok(revision)
    }

    fn get_revision(&self, id: RevisionId) -> Result<Option<Revision>, AttestaError> {
        Ok(self.revisions.get(&id).cloned())
    }

    fn append_version(
        &mut self,
        revision: RevisionId,
        record: &AttributeRecord,
    ) -> Result<VersionEntry, AttestaError> {
        let entry = VersionEntry {
            id: VersionId(allocate(&mut self.next_version_id)),
            revision,
            record: record.id,
            entity: record.entity,
            field: record.field.clone(),
            state: record.state(),
        };
        self.versions.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn get_version(&self, id: VersionId) -> Result<Option<VersionEntry>, AttestaError> {
        Ok(self.versions.get(&id).cloned())
    }

    fn versions_for_record(&self, record: RecordId) -> Result<Vec<VersionEntry>, AttestaError> {
        Ok(self
            .versions
            .values()
            .filter(|v| v.record == record)
            .cloned()
            .collect())
    }

    fn versions_for_entity(&self, entity: EntityId) -> Result<Vec<VersionEntry>, AttestaError> {
        Ok(self
            .versions
            .values()
            .filter(|v| v.entity == entity)
            .cloned()
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Attribute Store
//!
//! The storage-layer contract the complex-field engine is written against.
//!
//! Implementations provide plain CRUD over four kinds of rows (entities,
//! sources, attribute records, version snapshots) plus revisions. All
//! policy (sourcing, translation, versioning) lives above this trait; a
//! store never decides whether a write should happen.
//!
//! All fallible operations return `Result<T, AttestaError>` so in-memory and
//! persistent backends are interchangeable.

use crate::types::{
    AttestaError, AttributeRecord, EntityId, EntityKind, EntityRow, RecordDraft, RecordId,
    Revision, RevisionId, RevisionMeta, Source, SourceDraft, SourceId, VersionEntry, VersionId,
};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Relational storage for entities, attribute records and their history.
pub trait AttributeStore {
    // ----- entities -----

    /// Allocate a new entity row with a fresh UUID, unpublished.
    fn insert_entity(&mut self, kind: EntityKind) -> Result<EntityRow, AttestaError>;

    fn get_entity(&self, id: EntityId) -> Result<Option<EntityRow>, AttestaError>;

    fn find_entity_by_uuid(&self, uuid: Uuid) -> Result<Option<EntityRow>, AttestaError>;

    /// Overwrite an existing entity row (used for the `published` flag).
    fn put_entity(&mut self, row: &EntityRow) -> Result<(), AttestaError>;

    /// All entity rows, optionally restricted to one kind, in id order.
    fn entities(&self, kind: Option<EntityKind>) -> Result<Vec<EntityRow>, AttestaError>;

    // ----- sources -----

    fn insert_source(&mut self, draft: SourceDraft) -> Result<Source, AttestaError>;

    fn get_source(&self, id: SourceId) -> Result<Option<Source>, AttestaError>;

    // ----- attribute records -----

    fn insert_record(&mut self, draft: RecordDraft) -> Result<AttributeRecord, AttestaError>;

    /// Overwrite an existing record in place. The id must exist.
    fn put_record(&mut self, record: &AttributeRecord) -> Result<(), AttestaError>;

    /// Hard-delete a record. Its version snapshots are left untouched.
    fn delete_record(&mut self, id: RecordId) -> Result<(), AttestaError>;

    fn get_record(&self, id: RecordId) -> Result<Option<AttributeRecord>, AttestaError>;

    /// Live records of one field on one entity, in creation (id) order.
    fn records(&self, entity: EntityId, field: &str)
    -> Result<Vec<AttributeRecord>, AttestaError>;

    // ----- history -----

    /// Open a revision stamped with the current UTC time.
    fn begin_revision(&mut self, meta: &RevisionMeta) -> Result<Revision, AttestaError>;

    fn get_revision(&self, id: RevisionId) -> Result<Option<Revision>, AttestaError>;

    /// Append a snapshot of `record`'s current state to the version store.
    fn append_version(
        &mut self,
        revision: RevisionId,
        record: &AttributeRecord,
    ) -> Result<VersionEntry, AttestaError>;

    fn get_version(&self, id: VersionId) -> Result<Option<VersionEntry>, AttestaError>;

    /// Snapshots of one record, oldest first.
    fn versions_for_record(&self, record: RecordId) -> Result<Vec<VersionEntry>, AttestaError>;

    /// Snapshots of every record of one entity, oldest first.
    fn versions_for_entity(&self, entity: EntityId) -> Result<Vec<VersionEntry>, AttestaError>;

    // ----- provided -----

    /// Resolve posted source ids, dropping ids that do not exist.
    fn resolve_sources(&self, ids: &[SourceId]) -> Result<BTreeSet<SourceId>, AttestaError> {
        let mut resolved = BTreeSet::new();
        for &id in ids {
            if self.get_source(id)?.is_some() {
                resolved.insert(id);
            } else {
                tracing::warn!(source = id.0, "dropping unknown source id");
            }
        }
        Ok(resolved)
    }

    /// Whether an entity of the given kind exists under `id`.
    fn entity_exists(&self, kind: EntityKind, id: EntityId) -> Result<bool, AttestaError> {
        Ok(self.get_entity(id)?.is_some_and(|row| row.kind == kind))
    }

    /// Fetch an entity row or fail with `EntityNotFound`.
    fn require_entity(&self, id: EntityId) -> Result<EntityRow, AttestaError> {
        self.get_entity(id)?.ok_or(AttestaError::EntityNotFound(id))
    }
}

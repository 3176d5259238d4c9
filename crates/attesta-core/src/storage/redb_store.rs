//! # redb-backed Attribute Store
//!
//! A disk-backed `AttributeStore` on the redb embedded database, providing:
//! - ACID transactions (one write transaction per store operation)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Rows are postcard-encoded. Lookups by (entity, field), by record and by
//! entity go through multimap index tables so no operation scans the whole
//! record table.

use super::{decode, encode, storage_err};
use crate::store::AttributeStore;
use crate::types::{
    AttestaError, AttributeRecord, EntityId, EntityKind, EntityRow, RecordDraft, RecordId,
    Revision, RevisionId, RevisionMeta, Source, SourceDraft, SourceId, VersionEntry, VersionId,
};
use chrono::Utc;
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    Table, TableDefinition,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

/// Entity rows: EntityId -> EntityRow bytes
const ENTITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entities");

/// UUID index: uuid (u128) -> EntityId
const ENTITY_UUIDS: TableDefinition<u128, u64> = TableDefinition::new("entity_uuids");

/// Sources: SourceId -> Source bytes
const SOURCES: TableDefinition<u64, &[u8]> = TableDefinition::new("sources");

/// Attribute records: RecordId -> AttributeRecord bytes
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Live records per field: (EntityId, field model) -> RecordId
const FIELD_INDEX: MultimapTableDefinition<(u64, &str), u64> =
    MultimapTableDefinition::new("field_index");

/// Revisions: RevisionId -> Revision bytes
const REVISIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("revisions");

/// Version snapshots: VersionId -> VersionEntry bytes
const VERSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("versions");

/// Snapshots per record: RecordId -> VersionId
const RECORD_VERSIONS: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("record_versions");

/// Snapshots per entity: EntityId -> VersionId
const ENTITY_VERSIONS: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("entity_versions");

/// Id counters: key string -> last allocated id
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

type RowTable = TableDefinition<'static, u64, &'static [u8]>;

/// A disk-backed attribute store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

/// Allocate the next id for `key` inside an open write transaction.
fn next_id(meta: &mut Table<'_, &'static str, u64>, key: &str) -> Result<u64, AttestaError> {
    let current = meta
        .get(key)
        .map_err(storage_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current.saturating_add(1);
    meta.insert(key, next).map_err(storage_err)?;
    Ok(next)
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AttestaError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        let write_txn = db.begin_write().map_err(storage_err)?;
        for def in [ENTITIES, SOURCES, RECORDS, REVISIONS, VERSIONS] {
            write_txn.open_table(def).map_err(storage_err)?;
        }
        write_txn.open_table(ENTITY_UUIDS).map_err(storage_err)?;
        write_txn.open_table(METADATA).map_err(storage_err)?;
        write_txn
            .open_multimap_table(FIELD_INDEX)
            .map_err(storage_err)?;
        write_txn
            .open_multimap_table(RECORD_VERSIONS)
            .map_err(storage_err)?;
        write_txn
            .open_multimap_table(ENTITY_VERSIONS)
            .map_err(storage_err)?;
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), AttestaError> {
        self.db.compact().map_err(storage_err)?;
        Ok(())
    }

    fn read_row<T: DeserializeOwned>(&self, def: RowTable, id: u64) -> Result<Option<T>, AttestaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(def).map_err(storage_err)?;
        let row = table.get(id).map_err(storage_err)?;
        row.map(|guard| decode(guard.value())).transpose()
    }

    fn scan_rows<T: DeserializeOwned>(&self, def: RowTable) -> Result<Vec<T>, AttestaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(def).map_err(storage_err)?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    /// Overwrite an existing row, failing with `missing` if the id is absent.
    fn replace_row<T: Serialize>(
        &self,
        def: RowTable,
        id: u64,
        row: &T,
        missing: AttestaError,
    ) -> Result<(), AttestaError> {
        let bytes = encode(row)?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(def).map_err(storage_err)?;
            if table.get(id).map_err(storage_err)?.is_none() {
                return Err(missing);
            }
            table.insert(id, bytes.as_slice()).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    /// Load the version rows listed under `key` in a version index.
    fn indexed_versions(
        &self,
        index: MultimapTableDefinition<'static, u64, u64>,
        key: u64,
    ) -> Result<Vec<VersionEntry>, AttestaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let index = read_txn.open_multimap_table(index).map_err(storage_err)?;
        let versions = read_txn.open_table(VERSIONS).map_err(storage_err)?;

        let mut entries = Vec::new();
        for id in index.get(key).map_err(storage_err)? {
            let id = id.map_err(storage_err)?.value();
            if let Some(row) = versions.get(id).map_err(storage_err)? {
                entries.push(decode(row.value())?);
            }
        }
        Ok(entries)
    }
}

// =============================================================================
// ATTRIBUTESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl AttributeStore for RedbStore {
    fn insert_entity(&mut self, kind: EntityKind) -> Result<EntityRow, AttestaError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let row = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let row = EntityRow {
                id: EntityId(next_id(&mut meta, "next_entity_id")?),
                uuid: Uuid::new_v4(),
                kind,
                published: false,
            };
            let bytes = encode(&row)?;

            let mut entities = write_txn.open_table(ENTITIES).map_err(storage_err)?;
            entities
                .insert(row.id.0, bytes.as_slice())
                .map_err(storage_err)?;
            let mut uuids = write_txn.open_table(ENTITY_UUIDS).map_err(storage_err)?;
            uuids
                .insert(row.uuid.as_u128(), row.id.0)
                .map_err(storage_err)?;
            row
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(row)
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<EntityRow>, AttestaError> {
        self.read_row(ENTITIES, id.0)
    }

    fn find_entity_by_uuid(&self, uuid: Uuid) -> Result<Option<EntityRow>, AttestaError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(storage_err)?;
            let uuids = read_txn.open_table(ENTITY_UUIDS).map_err(storage_err)?;
            uuids
                .get(uuid.as_u128())
                .map_err(storage_err)?
                .map(|v| v.value())
        };
        match id {
            Some(id) => self.get_entity(EntityId(id)),
            None => Ok(None),
        }
    }

    fn put_entity(&mut self, row: &EntityRow) -> Result<(), AttestaError> {
        self.replace_row(ENTITIES, row.id.0, row, AttestaError::EntityNotFound(row.id))
    }

    fn entities(&self, kind: Option<EntityKind>) -> Result<Vec<EntityRow>, AttestaError> {
        let rows: Vec<EntityRow> = self.scan_rows(ENTITIES)?;
        Ok(rows
            .into_iter()
            .filter(|row| kind.is_none_or(|k| row.kind == k))
            .collect())
    }

    fn insert_source(&mut self, draft: SourceDraft) -> Result<Source, AttestaError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let source = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let source = Source::from_draft(SourceId(next_id(&mut meta, "next_source_id")?), draft);
            let bytes = encode(&source)?;
            let mut sources = write_txn.open_table(SOURCES).map_err(storage_err)?;
            sources
                .insert(source.id.0, bytes.as_slice())
                .map_err(storage_err)?;
            source
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(source)
    }

    fn get_source(&self, id: SourceId) -> Result<Option<Source>, AttestaError> {
        self.read_row(SOURCES, id.0)
    }

    fn insert_record(&mut self, draft: RecordDraft) -> Result<AttributeRecord, AttestaError> {
        if self.get_entity(draft.entity)?.is_none() {
            return Err(AttestaError::EntityNotFound(draft.entity));
        }

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let record = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let mut record = AttributeRecord {
                id: RecordId(next_id(&mut meta, "next_record_id")?),
                entity: draft.entity,
                field: draft.field,
                language: None,
                value: None,
                confidence: None,
                sources: BTreeSet::new(),
            };
            record.apply(draft.state);
            let bytes = encode(&record)?;

            let mut records = write_txn.open_table(RECORDS).map_err(storage_err)?;
            records
                .insert(record.id.0, bytes.as_slice())
                .map_err(storage_err)?;
            let mut index = write_txn
                .open_multimap_table(FIELD_INDEX)
                .map_err(storage_err)?;
            index
                .insert((record.entity.0, record.field.as_str()), record.id.0)
                .map_err(storage_err)?;
            record
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(record)
    }

    fn put_record(&mut self, record: &AttributeRecord) -> Result<(), AttestaError> {
        self.replace_row(
            RECORDS,
            record.id.0,
            record,
            AttestaError::RecordNotFound(record.id),
        )
    }

    fn delete_record(&mut self, id: RecordId) -> Result<(), AttestaError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut records = write_txn.open_table(RECORDS).map_err(storage_err)?;
            let record: AttributeRecord = match records.remove(id.0).map_err(storage_err)? {
                Some(bytes) => decode(bytes.value())?,
                None => return Err(AttestaError::RecordNotFound(id)),
            };
            let mut index = write_txn
                .open_multimap_table(FIELD_INDEX)
                .map_err(storage_err)?;
            index
                .remove((record.entity.0, record.field.as_str()), id.0)
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    fn get_record(&self, id: RecordId) -> Result<Option<AttributeRecord>, AttestaError> {
        self.read_row(RECORDS, id.0)
    }

    fn records(
        &self,
        entity: EntityId,
        field: &str,
    ) -> Result<Vec<AttributeRecord>, AttestaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let index = read_txn
            .open_multimap_table(FIELD_INDEX)
            .map_err(storage_err)?;
        let records = read_txn.open_table(RECORDS).map_err(storage_err)?;

        let mut found = Vec::new();
        for id in index.get((entity.0, field)).map_err(storage_err)? {
            let id = id.map_err(storage_err)?.value();
            if let Some(row) = records.get(id).map_err(storage_err)? {
                found.push(decode(row.value())?);
            }
        }
        Ok(found)
    }

    fn begin_revision(&mut self, meta: &RevisionMeta) -> Result<Revision, AttestaError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let revision = {
            let mut counters = write_txn.open_table(METADATA).map_err(storage_err)?;
            let revision = Revision {
                id: RevisionId(next_id(&mut counters, "next_revision_id")?),
                created_at: Utc::now(),
                editor: meta.editor.clone(),
                comment: meta.comment.clone(),
            };
            let bytes = encode(&revision)?;
            let mut revisions = write_txn.open_table(REVISIONS).map_err(storage_err)?;
            revisions
                .insert(revision.id.0, bytes.as_slice())
                .map_err(storage_err)?;
            revision
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(revision)
    }

    fn get_revision(&self, id: RevisionId) -> Result<Option<Revision>, AttestaError> {
        self.read_row(REVISIONS, id.0)
    }

    fn append_version(
        &mut self,
        revision: RevisionId,
        record: &AttributeRecord,
    ) -> Result<VersionEntry, AttestaError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let entry = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let entry = VersionEntry {
                id: VersionId(next_id(&mut meta, "next_version_id")?),
                revision,
                record: record.id,
                entity: record.entity,
                field: record.field.clone(),
                state: record.state(),
            };
            let bytes = encode(&entry)?;

            let mut versions = write_txn.open_table(VERSIONS).map_err(storage_err)?;
            versions
                .insert(entry.id.0, bytes.as_slice())
                .map_err(storage_err)?;
            let mut by_record = write_txn
                .open_multimap_table(RECORD_VERSIONS)
                .map_err(storage_err)?;
            by_record
                .insert(entry.record.0, entry.id.0)
                .map_err(storage_err)?;
            let mut by_entity = write_txn
                .open_multimap_table(ENTITY_VERSIONS)
                .map_err(storage_err)?;
            by_entity
                .insert(entry.entity.0, entry.id.0)
                .map_err(storage_err)?;
            entry
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(entry)
    }

    fn get_version(&self, id: VersionId) -> Result<Option<VersionEntry>, AttestaError> {
        self.read_row(VERSIONS, id.0)
    }

    fn versions_for_record(&self, record: RecordId) -> Result<Vec<VersionEntry>, AttestaError> {
        self.indexed_versions(RECORD_VERSIONS, record.0)
    }

    fn versions_for_entity(&self, entity: EntityId) -> Result<Vec<VersionEntry>, AttestaError> {
        self.indexed_versions(ENTITY_VERSIONS, entity.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================

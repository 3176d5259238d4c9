//! # attesta-core
//!
//! The attribute-versioning engine for human-rights data curation.
//!
//! Every attribute of every tracked entity (organizations, people, sites,
//! emplacements, violations) is stored as its own record carrying sources,
//! a confidence level, an optional language tag and a full edit history.
//!
//! ## Layers
//!
//! ```text
//! Entity ── validate / update / create
//!   ├─ ComplexField       single value, per language
//!   └─ ComplexFieldList   0..N members, each independently sourced
//!         │
//!   AttributeStore        MemoryStore | RedbStore
//!         │
//!   VersionStore          snapshots grouped into revisions
//! ```
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - Deterministic: BTreeMap ordering, integer-only geometry
//! - No ambient state: language, editor and comment are explicit parameters

// =============================================================================
// MODULES
// =============================================================================

pub mod backend;
pub mod coerce;
pub mod entity;
pub mod field;
pub mod formats;
pub mod history;
pub mod list;
pub mod policy;
pub mod primitives;
pub mod schema;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ApproximateDate, AttestaError, AttributeRecord, Confidence, EntityId, EntityKind, EntityRow,
    FieldError, FieldValue, GeoPoint, Language, RecordDraft, RecordId, RecordState, Revision,
    RevisionId, RevisionMeta, Source, SourceDraft, SourceId, VersionEntry, VersionId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use coerce::{Coerced, RawValue};
pub use entity::{
    Entity, FieldInput, FieldMap, UpdateReport, ValidatedField, ValidatedMap, ValidationErrors,
};
pub use field::{ComplexField, Evidence, RevisionScope, UpdateOutcome};
pub use history::{Difference, FlattenedState, Revisions, StateValue, get_differences, get_revisions};
pub use list::{ComplexFieldList, ListOutcome};
pub use policy::{FieldDef, FieldPolicy, Multiplicity, Sourcing, ValueKind};
pub use schema::{EntitySchema, FieldAccessor, Registry};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use backend::StorageBackend;
pub use formats::{SnapshotHeader, store_from_bytes, store_to_bytes};
pub use storage::{MemoryStore, RedbStore};
pub use store::AttributeStore;

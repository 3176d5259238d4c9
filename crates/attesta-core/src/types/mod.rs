//! # Core Type Definitions
//!
//! This module contains all core types for the attribute store:
//! - Identifiers (`EntityId`, `RecordId`, `RevisionId`, `VersionId`, `SourceId`)
//! - Attribute values (`FieldValue`, `ApproximateDate`, `GeoPoint`)
//! - Provenance (`Confidence`, `Source`)
//! - Stored rows (`EntityRow`, `AttributeRecord`, `Revision`, `VersionEntry`)
//! - Error types (`AttestaError`, `FieldError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (geometry is fixed-point)
//! - Implement `Ord` where they are used as keys or sort criteria
//! - Use `BTreeSet` for source sets so equality is order independent

use crate::primitives::{
    CONFIDENCE_HIGH, CONFIDENCE_LOW, CONFIDENCE_MEDIUM, FALLBACK_LANGUAGE, GEO_DECIMALS, GEO_SCALE,
    MAX_LANGUAGE_LENGTH, MIN_LANGUAGE_LENGTH,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Surrogate key of a tracked entity (organization, person, site, ...).
    EntityId
);
id_type!(
    /// Identifier of one stored attribute record.
    RecordId
);
id_type!(
    /// Identifier of a revision (one commit grouping several snapshots).
    RevisionId
);
id_type!(
    /// Identifier of one version snapshot of an attribute record.
    VersionId
);
id_type!(
    /// Opaque reference to an evidentiary source or access point.
    SourceId
);

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// The kinds of aggregate roots the store tracks.
///
/// The last four are relationships: their required fields are references
/// to other entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Organization,
    Person,
    Geosite,
    Emplacement,
    Violation,
    Area,
    MembershipPerson,
    MembershipOrganization,
    Composition,
    Association,
}

impl EntityKind {
    /// All kinds in declaration order.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Organization,
        EntityKind::Person,
        EntityKind::Geosite,
        EntityKind::Emplacement,
        EntityKind::Violation,
        EntityKind::Area,
        EntityKind::MembershipPerson,
        EntityKind::MembershipOrganization,
        EntityKind::Composition,
        EntityKind::Association,
    ];

    /// The type name used as the prefix of qualified field keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Organization => "Organization",
            EntityKind::Person => "Person",
            EntityKind::Geosite => "Geosite",
            EntityKind::Emplacement => "Emplacement",
            EntityKind::Violation => "Violation",
            EntityKind::Area => "Area",
            EntityKind::MembershipPerson => "MembershipPerson",
            EntityKind::MembershipOrganization => "MembershipOrganization",
            EntityKind::Composition => "Composition",
            EntityKind::Association => "Association",
        }
    }

    /// Parse a type name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// LANGUAGE
// =============================================================================

/// A lowercase language tag such as `en`, `fr` or `es-mx`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Language(String);

impl Language {
    /// Parse and normalise a language tag.
    pub fn new(tag: impl AsRef<str>) -> Result<Self, AttestaError> {
        let tag = tag.as_ref().trim().to_ascii_lowercase();
        let valid_chars = tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if tag.len() < MIN_LANGUAGE_LENGTH || tag.len() > MAX_LANGUAGE_LENGTH || !valid_chars {
            return Err(AttestaError::InvalidValue(format!(
                "Invalid language tag: {:?}",
                tag
            )));
        }
        Ok(Self(tag))
    }

    /// The language translated fields fall back to.
    #[must_use]
    pub fn fallback() -> Self {
        Self(FALLBACK_LANGUAGE.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CONFIDENCE
// =============================================================================

/// Coarse reliability rating attached to a sourced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Map a numeric level (1..=3) to a confidence. Zero and other values are `None`.
    #[must_use]
    pub const fn from_level(level: i64) -> Option<Self> {
        match level {
            CONFIDENCE_LOW => Some(Confidence::Low),
            CONFIDENCE_MEDIUM => Some(Confidence::Medium),
            CONFIDENCE_HIGH => Some(Confidence::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn level(self) -> i64 {
        match self {
            Confidence::Low => CONFIDENCE_LOW,
            Confidence::Medium => CONFIDENCE_MEDIUM,
            Confidence::High => CONFIDENCE_HIGH,
        }
    }

    /// The level reported when a record carries no confidence.
    #[must_use]
    pub const fn lowest() -> Self {
        Confidence::Low
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        };
        f.write_str(label)
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// A calendar date that may omit its day, or its month and day.
///
/// Sorted by year, then month, then day; a missing component sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApproximateDate {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
}

impl ApproximateDate {
    /// Build a date, returning `None` for impossible combinations.
    ///
    /// A day requires a month; complete dates must exist in the calendar.
    #[must_use]
    pub fn new(year: i32, month: Option<u32>, day: Option<u32>) -> Option<Self> {
        if !(1..=9999).contains(&year) {
            return None;
        }
        match (month, day) {
            (None, None) => {}
            (Some(m), None) if (1..=12).contains(&m) => {}
            (Some(m), Some(d)) if NaiveDate::from_ymd_opt(year, m, d).is_some() => {}
            _ => return None,
        }
        Some(Self { year, month, day })
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(&self) -> Option<u32> {
        self.month
    }

    #[must_use]
    pub const fn day(&self) -> Option<u32> {
        self.day
    }
}

impl fmt::Display for ApproximateDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
        }
        if let Some(day) = self.day {
            write!(f, "-{:02}", day)?;
        }
        Ok(())
    }
}

/// A WGS84 point stored as fixed-point degrees (scaled by `GEO_SCALE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: i64,
    pub lat: i64,
}

impl GeoPoint {
    /// Build a point from scaled coordinates, rejecting out-of-range values.
    #[must_use]
    pub fn new(lon: i64, lat: i64) -> Option<Self> {
        let lon_ok = (-180 * GEO_SCALE..=180 * GEO_SCALE).contains(&lon);
        let lat_ok = (-90 * GEO_SCALE..=90 * GEO_SCALE).contains(&lat);
        (lon_ok && lat_ok).then_some(Self { lon, lat })
    }
}

fn write_fixed(f: &mut fmt::Formatter<'_>, scaled: i64) -> fmt::Result {
    let sign = if scaled < 0 { "-" } else { "" };
    let abs = scaled.unsigned_abs();
    let scale = GEO_SCALE as u64;
    let whole = abs / scale;
    let frac = abs % scale;
    if frac == 0 {
        return write!(f, "{}{}", sign, whole);
    }
    let digits = format!("{:0width$}", frac, width = GEO_DECIMALS);
    write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("POINT(")?;
        write_fixed(f, self.lon)?;
        f.write_str(" ")?;
        write_fixed(f, self.lat)?;
        f.write_str(")")
    }
}

/// A stored attribute value. The variant always matches the field's `ValueKind`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Date(ApproximateDate),
    Bool(bool),
    /// Reference to another tracked entity.
    Ref(EntityId),
    Geometry(GeoPoint),
}

impl FieldValue {
    /// Empty text counts as no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(text) if text.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Date(date) => write!(f, "{}", date),
            FieldValue::Bool(flag) => write!(f, "{}", flag),
            FieldValue::Ref(id) => write!(f, "#{}", id),
            FieldValue::Geometry(point) => write!(f, "{}", point),
        }
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// The stored row of an aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: EntityId,
    /// Stable external identifier used in URLs.
    pub uuid: Uuid,
    pub kind: EntityKind,
    pub published: bool,
}

/// Fields of a source before the store assigns its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDraft {
    pub title: String,
    pub publication: Option<String>,
    pub url: Option<String>,
    /// Page, archive snapshot or other pointer into the source.
    pub access_point: Option<String>,
}

impl SourceDraft {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// An evidentiary reference attribute records can cite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub title: String,
    pub publication: Option<String>,
    pub url: Option<String>,
    pub access_point: Option<String>,
}

impl Source {
    #[must_use]
    pub fn from_draft(id: SourceId, draft: SourceDraft) -> Self {
        Self {
            id,
            title: draft.title,
            publication: draft.publication,
            url: draft.url,
            access_point: draft.access_point,
        }
    }
}

/// The mutable part of an attribute record; what version snapshots capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordState {
    pub language: Option<Language>,
    pub value: Option<FieldValue>,
    pub confidence: Option<Confidence>,
    pub sources: BTreeSet<SourceId>,
}

impl RecordState {
    /// Whether the state holds a non-empty value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// One stored value of one field on one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub id: RecordId,
    pub entity: EntityId,
    /// Model name of the field, e.g. `OrganizationName`.
    pub field: String,
    pub language: Option<Language>,
    pub value: Option<FieldValue>,
    pub confidence: Option<Confidence>,
    pub sources: BTreeSet<SourceId>,
}

impl AttributeRecord {
    #[must_use]
    pub fn state(&self) -> RecordState {
        RecordState {
            language: self.language.clone(),
            value: self.value.clone(),
            confidence: self.confidence,
            sources: self.sources.clone(),
        }
    }

    /// Overwrite the mutable part of the record.
    pub fn apply(&mut self, state: RecordState) {
        self.language = state.language;
        self.value = state.value;
        self.confidence = state.confidence;
        self.sources = state.sources;
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// Fields of an attribute record before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub entity: EntityId,
    pub field: String,
    pub state: RecordState,
}

/// Who made a change and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMeta {
    pub editor: Option<String>,
    pub comment: String,
}

impl RevisionMeta {
    #[must_use]
    pub fn new(editor: Option<String>, comment: impl Into<String>) -> Self {
        Self {
            editor,
            comment: comment.into(),
        }
    }
}

/// A commit grouping the snapshots written by one update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub created_at: DateTime<Utc>,
    pub editor: Option<String>,
    pub comment: String,
}

/// Snapshot of one attribute record at one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: VersionId,
    pub revision: RevisionId,
    pub record: RecordId,
    pub entity: EntityId,
    pub field: String,
    pub state: RecordState,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the store and the field accessors.
///
/// - No silent failures
/// - Storage-layer failures propagate with their original message
/// - The engine never panics
#[derive(Debug, Error)]
pub enum AttestaError {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Attribute record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Version not found: {0}")]
    VersionNotFound(VersionId),

    #[error("Revision not found: {0}")]
    RevisionNotFound(RevisionId),

    /// A qualified key or model name did not resolve to a field.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityKind(String),

    /// Raised by `translate` when the field has no base record yet.
    #[error("Can't translate a field that doesn't exist")]
    FieldDoesNotExist,

    /// Raised by `translate` when the language already holds a value.
    #[error("Can't translate an already translated field")]
    AlreadyTranslated,

    #[error("Field {0} is not translatable")]
    NotTranslatable(String),

    /// Data that should have been rejected by validation reached a write.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The storage layer reported a failure (transaction, table, commit).
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

/// A per-field validation failure, displayed inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("This field is required")]
    RequiredFieldMissing,

    #[error("Sources are required to update this field")]
    MissingSource,

    #[error("Confidence is required to update this field")]
    MissingConfidence,

    #[error("{0}")]
    InvalidValue(String),
}

// =============================================================================
// TESTS
// =============================================================================

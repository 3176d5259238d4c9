//! # Entity
//!
//! The aggregate root and its write protocol.
//!
//! Callers build a `FieldMap` keyed by qualified field key, run it through
//! `Entity::validate`, and hand the resulting `ValidatedMap` to `update` or
//! `create`. Validation is batch: every field is checked and all errors are
//! returned together. Writes fan out field by field in schema order
//! (single fields first, then lists), each field deciding independently
//! whether anything is written.
//!
//! Every `update` call opens at most one revision, and only if some
//! versioned field actually changed.

use crate::coerce::{Coerced, RawValue};
use crate::field::{ComplexField, Evidence, RevisionScope, check_input};
use crate::list::ComplexFieldList;
use crate::policy::{FieldDef, Multiplicity};
use crate::schema::EntitySchema;
use crate::store::AttributeStore;
use crate::types::{
    AttestaError, Confidence, EntityId, EntityKind, EntityRow, FieldError, FieldValue, Language,
    RevisionId, RevisionMeta, SourceId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use uuid::Uuid;

// =============================================================================
// PROTOCOL TYPES
// =============================================================================

/// One posted field: a raw value with its claimed provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldInput {
    pub value: RawValue,
    /// Numeric confidence level; `0` or absent means unset.
    pub confidence: Option<i64>,
    pub sources: Vec<SourceId>,
}

impl FieldInput {
    #[must_use]
    pub fn new(value: impl Into<RawValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, level: i64) -> Self {
        self.confidence = Some(level);
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceId>) -> Self {
        self.sources = sources.into_iter().collect();
        self
    }
}

/// A field that passed validation, carrying its coerced value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedField {
    pub value: Coerced,
    pub confidence: Option<Confidence>,
    pub sources: Vec<SourceId>,
}

/// Posted fields keyed by qualified key.
pub type FieldMap = BTreeMap<String, FieldInput>;

/// Validated fields keyed by qualified key. The only input `update` accepts.
pub type ValidatedMap = BTreeMap<String, ValidatedField>;

/// Field errors keyed by qualified key.
pub type ValidationErrors = BTreeMap<String, FieldError>;

/// What one `update` call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// The revision grouping this call's snapshots, if any were written.
    pub revision: Option<RevisionId>,
    /// Qualified keys of the fields that changed, in write order.
    pub changed: Vec<String>,
}

// =============================================================================
// ENTITY
// =============================================================================

/// A tracked entity bound to its static schema.
#[derive(Debug, Clone)]
pub struct Entity {
    row: EntityRow,
    schema: &'static EntitySchema,
}

impl Entity {
    /// Load an entity by id.
    pub fn load<S: AttributeStore + ?Sized>(store: &S, id: EntityId) -> Result<Self, AttestaError> {
        let row = store.require_entity(id)?;
        Ok(Self::from_row(row))
    }

    /// Load an entity by its external UUID.
    pub fn by_uuid<S: AttributeStore + ?Sized>(
        store: &S,
        uuid: Uuid,
    ) -> Result<Option<Self>, AttestaError> {
        Ok(store.find_entity_by_uuid(uuid)?.map(Self::from_row))
    }

    #[must_use]
    pub fn from_row(row: EntityRow) -> Self {
        let schema = EntitySchema::of(row.kind);
        Self { row, schema }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.row.id
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.row.uuid
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.row.kind
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.row.published
    }

    #[must_use]
    pub fn row(&self) -> &EntityRow {
        &self.row
    }

    #[must_use]
    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// The single-valued field with the given model name.
    pub fn field(&self, model: &str) -> Result<ComplexField, AttestaError> {
        match self.schema.field(model) {
            Some(def) if !def.is_list() => Ok(ComplexField::new(self.row.id, def)),
            _ => Err(AttestaError::UnknownField(model.to_string())),
        }
    }

    /// The list field with the given model name.
    pub fn list(&self, model: &str) -> Result<ComplexFieldList, AttestaError> {
        match self.schema.field(model) {
            Some(def) if def.is_list() => Ok(ComplexFieldList::new(self.row.id, def)),
            _ => Err(AttestaError::UnknownField(model.to_string())),
        }
    }

    // ----- validate / update / create -----

    /// Validate a posted mapping against this entity's schema.
    pub fn validate<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        map: &FieldMap,
    ) -> Result<(ValidationErrors, ValidatedMap), AttestaError> {
        validate_mapping(store, self.schema, map)
    }

    /// Validate a mapping for a not-yet-created entity of `kind`.
    pub fn validate_new<S: AttributeStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        map: &FieldMap,
    ) -> Result<(ValidationErrors, ValidatedMap), AttestaError> {
        validate_mapping(store, EntitySchema::of(kind), map)
    }

    /// Apply a validated mapping. Keys absent from `map` are left untouched.
    ///
    /// Fields are written independently; a failure part-way leaves the fields
    /// already written in place.
    pub fn update<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        map: &ValidatedMap,
        lang: &Language,
        meta: RevisionMeta,
    ) -> Result<UpdateReport, AttestaError> {
        let mut scope = RevisionScope::new(meta);
        let mut changed = Vec::new();

        for def in self.schema.write_order() {
            let key = def.key();
            let Some(field) = map.get(&key) else {
                continue;
            };
            let evidence = Evidence::new(field.confidence, store.resolve_sources(&field.sources)?);

            let wrote = match (&field.value, def.multiplicity) {
                (Coerced::Single(value), Multiplicity::Single) => ComplexField::new(self.row.id, def)
                    .update(store, &mut scope, lang, value.clone(), evidence)?
                    .is_write(),
                (Coerced::List(values), Multiplicity::List) => ComplexFieldList::new(self.row.id, def)
                    .update(store, &mut scope, lang, values, &evidence)?
                    .is_write(),
                _ => {
                    return Err(AttestaError::InvalidValue(format!(
                        "{} was not validated as a {:?} field",
                        key, def.multiplicity
                    )));
                }
            };
            if wrote {
                changed.push(key);
            }
        }

        debug!(entity = %self.row.id, changed = changed.len(), "entity updated");
        Ok(UpdateReport {
            revision: scope.revision(),
            changed,
        })
    }

    /// Allocate a new entity row and apply a validated mapping to it.
    pub fn create<S: AttributeStore + ?Sized>(
        store: &mut S,
        kind: EntityKind,
        map: &ValidatedMap,
        lang: &Language,
        meta: RevisionMeta,
    ) -> Result<Self, AttestaError> {
        let entity = Self::from_row(store.insert_entity(kind)?);
        entity.update(store, map, lang, meta)?;
        info!(entity = %entity.id(), kind = %kind, uuid = %entity.uuid(), "entity created");
        Ok(entity)
    }

    /// Set the public visibility flag.
    pub fn set_published<S: AttributeStore + ?Sized>(
        &mut self,
        store: &mut S,
        published: bool,
    ) -> Result<(), AttestaError> {
        let mut row = self.row.clone();
        row.published = published;
        store.put_entity(&row)?;
        self.row = row;
        info!(entity = %self.row.id, published, "visibility changed");
        Ok(())
    }

    // ----- read surface -----

    /// Current values of every field for `lang`, in declaration order.
    pub fn values<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Vec<(&'static FieldDef, Vec<FieldValue>)>, AttestaError> {
        let mut values = Vec::with_capacity(self.schema.fields.len());
        for def in self.schema.fields {
            values.push((def, self.field_values(store, def, lang)?));
        }
        Ok(values)
    }

    fn field_values<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        def: &'static FieldDef,
        lang: &Language,
    ) -> Result<Vec<FieldValue>, AttestaError> {
        if def.is_list() {
            return ComplexFieldList::new(self.row.id, def).get_values(store, lang);
        }
        Ok(ComplexField::new(self.row.id, def)
            .get_value(store, lang)?
            .and_then(|record| record.value)
            .into_iter()
            .collect())
    }

    /// The value of the schema's title field.
    pub fn title<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Option<FieldValue>, AttestaError> {
        let Some(def) = self.schema.field(self.schema.title) else {
            return Ok(None);
        };
        Ok(self.field_values(store, def, lang)?.into_iter().next())
    }

    /// Whether every required field holds a value.
    pub fn is_complete<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<bool, AttestaError> {
        for def in self.schema.fields.iter().filter(|d| self.schema.is_required(d)) {
            if self.field_values(store, def, lang)?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Union of the sources cited by every field and list member.
    pub fn sources<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<BTreeSet<SourceId>, AttestaError> {
        let mut sources = BTreeSet::new();
        for def in self.schema.fields {
            if def.is_list() {
                for member in ComplexFieldList::new(self.row.id, def).get_list(store, lang)? {
                    sources.extend(member.get_sources(store, lang)?);
                }
            } else {
                sources.extend(ComplexField::new(self.row.id, def).get_sources(store, lang)?);
            }
        }
        Ok(sources)
    }
}

/// Batch-validate `map` against `schema`.
///
/// A required key that is absent or empty yields `RequiredFieldMissing`;
/// every other present key is delegated to field validation. Keys that do
/// not belong to the schema are ignored.
fn validate_mapping<S: AttributeStore + ?Sized>(
    store: &S,
    schema: &EntitySchema,
    map: &FieldMap,
) -> Result<(ValidationErrors, ValidatedMap), AttestaError> {
    let mut errors = ValidationErrors::new();
    let mut validated = ValidatedMap::new();

    for def in schema.write_order() {
        let key = def.key();
        let input = map.get(&key);
        if input.is_none_or(|i| i.value.is_empty()) && schema.is_required(def) {
            errors.insert(key, FieldError::RequiredFieldMissing);
            continue;
        }
        let Some(input) = input else {
            continue;
        };
        match check_input(store, def, input)? {
            Ok(field) => {
                validated.insert(key, field);
            }
            Err(error) => {
                errors.insert(key, error);
            }
        }
    }

    for key in map.keys().filter(|k| !validated.contains_key(*k) && !errors.contains_key(*k)) {
        debug!(key = %key, kind = %schema.kind, "ignoring key outside the schema");
    }
    Ok((errors, validated))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::SourceDraft;

    fn store_with_source() -> (MemoryStore, SourceId) {
        let mut store = MemoryStore::new();
        let src = store
            .insert_source(SourceDraft::new("Premium Times"))
            .expect("source")
            .id;
        (store, src)
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn missing_required_field_is_reported() {
        let (store, _) = store_with_source();
        let (errors, validated) =
            Entity::validate_new(&store, EntityKind::Organization, &FieldMap::new()).expect("validate");
        assert_eq!(
            errors.get("Organization_OrganizationName"),
            Some(&FieldError::RequiredFieldMissing)
        );
        assert_eq!(errors.len(), 1);
        assert!(validated.is_empty());
    }

    #[test]
    fn errors_are_collected_in_one_pass() {
        let (store, src) = store_with_source();
        let map = FieldMap::from([
            (
                "Organization_OrganizationName".to_string(),
                FieldInput::new("Acme").with_confidence(3),
            ),
            (
                "Organization_OrganizationFoundingDate".to_string(),
                FieldInput::new("sometime").with_confidence(2).with_sources([src]),
            ),
        ]);
        let (errors, _) =
            Entity::validate_new(&store, EntityKind::Organization, &map).expect("validate");
        assert_eq!(
            errors.get("Organization_OrganizationName"),
            Some(&FieldError::MissingSource)
        );
        assert!(matches!(
            errors.get("Organization_OrganizationFoundingDate"),
            Some(FieldError::InvalidValue(_))
        ));
    }

    #[test]
    fn create_round_trips_coerced_values() {
        let (mut store, src) = store_with_source();
        let en = Language::fallback();
        let map = FieldMap::from([
            (
                "Organization_OrganizationName".to_string(),
                FieldInput::new("Acme").with_confidence(3).with_sources([src]),
            ),
            (
                "Organization_OrganizationRealFounding".to_string(),
                FieldInput::new("True"),
            ),
            (
                "Organization_OrganizationClassification".to_string(),
                FieldInput::new(RawValue::List(vec!["Army".into(), "Police".into()]))
                    .with_confidence(2)
                    .with_sources([src]),
            ),
        ]);
        let (errors, validated) =
            Entity::validate_new(&store, EntityKind::Organization, &map).expect("validate");
        assert!(errors.is_empty(), "{:?}", errors);

        let org = Entity::create(
            &mut store,
            EntityKind::Organization,
            &validated,
            &en,
            RevisionMeta::new(None, "created"),
        )
        .expect("create");

        assert_eq!(org.title(&store, &en).expect("title"), Some(text("Acme")));
        let flag = org.field("OrganizationRealFounding").expect("field");
        assert_eq!(
            flag.get_value(&store, &en).expect("get").and_then(|r| r.value),
            Some(FieldValue::Bool(true))
        );
        let classes = org.list("OrganizationClassification").expect("list");
        assert_eq!(
            classes.get_values(&store, &en).expect("values"),
            vec![text("Army"), text("Police")]
        );
        assert!(org.is_complete(&store, &en).expect("complete"));
        assert_eq!(org.sources(&store, &en).expect("sources"), BTreeSet::from([src]));
    }

    #[test]
    fn noop_update_opens_no_revision() {
        let (mut store, src) = store_with_source();
        let en = Language::fallback();
        let map = FieldMap::from([(
            "Person_PersonName".to_string(),
            FieldInput::new("Ada").with_confidence(1).with_sources([src]),
        )]);
        let (_, validated) = Entity::validate_new(&store, EntityKind::Person, &map).expect("validate");
        let person = Entity::create(&mut store, EntityKind::Person, &validated, &en, RevisionMeta::default())
            .expect("create");
        let revisions = store.revision_count();

        let report = person
            .update(&mut store, &validated, &en, RevisionMeta::default())
            .expect("update");
        assert!(report.changed.is_empty());
        assert!(report.revision.is_none());
        assert_eq!(store.revision_count(), revisions);
    }

    #[test]
    fn field_lookup_respects_multiplicity() {
        let mut store = MemoryStore::new();
        let row = store.insert_entity(EntityKind::Person).expect("insert");
        let person = Entity::load(&store, row.id).expect("load");
        assert!(person.field("PersonName").is_ok());
        assert!(person.field("PersonAlias").is_err());
        assert!(person.list("PersonAlias").is_ok());
        assert!(matches!(person.field("Nickname"), Err(AttestaError::UnknownField(_))));
        assert!(!person.is_complete(&store, &Language::fallback()).expect("complete"));
    }

    #[test]
    fn publish_flag_round_trips() {
        let mut store = MemoryStore::new();
        let row = store.insert_entity(EntityKind::Geosite).expect("insert");
        let mut site = Entity::load(&store, row.id).expect("load");
        assert!(!site.is_published());

        site.set_published(&mut store, true).expect("publish");
        let reloaded = Entity::by_uuid(&store, site.uuid())
            .expect("lookup")
            .expect("exists");
        assert!(reloaded.is_published());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let (mut store, _) = store_with_source();
        let row = store.insert_entity(EntityKind::Violation).expect("insert");
        let violation = Entity::load(&store, row.id).expect("load");
        let map = ValidatedMap::from([(
            "Violation_ViolationType".to_string(),
            ValidatedField {
                value: Coerced::Single(Some(text("Arrest"))),
                confidence: None,
                sources: Vec::new(),
            },
        )]);
        let result = violation.update(&mut store, &map, &Language::fallback(), RevisionMeta::default());
        assert!(matches!(result, Err(AttestaError::InvalidValue(_))));
    }
}

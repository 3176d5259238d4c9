//! # Complex Field
//!
//! The single-value accessor: one field on one entity, with provenance.
//!
//! A `ComplexField` owns no data. It binds `(entity, field definition)` and
//! reads or writes the matching `AttributeRecord`s through an
//! `AttributeStore`. For list members the binding also carries the member's
//! record id, and every operation is scoped to that one record.
//!
//! ## Write protocol
//!
//! ```text
//! update(value, lang, evidence)
//!   ├─ no live record for lang ─────────────▶ create (+ snapshot if versioned)
//!   ├─ same value, sources, confidence ─────▶ no-op
//!   └─ otherwise
//!        ├─ value changed & translated ─────▶ null every other language
//!        └─ overwrite in place (+ snapshot if versioned)
//! ```
//!
//! Snapshots capture the state after each write, so the previous value of
//! a field is always already in the version store when it is overwritten.

use crate::coerce::coerce;
use crate::entity::{FieldInput, ValidatedField};
use crate::policy::FieldDef;
use crate::primitives::FALLBACK_LANGUAGE;
use crate::store::AttributeStore;
use crate::types::{
    AttestaError, AttributeRecord, Confidence, EntityId, FieldError, FieldValue, Language,
    RecordDraft, RecordId, RecordState, Revision, RevisionId, RevisionMeta, SourceId,
    VersionEntry, VersionId,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

// =============================================================================
// REVISION SCOPE
// =============================================================================

/// Groups the snapshots written by one logical change into one revision.
///
/// The revision is opened lazily on the first snapshot, so a change that
/// writes nothing leaves no trace in the history.
#[derive(Debug, Clone)]
pub struct RevisionScope {
    meta: RevisionMeta,
    revision: Option<RevisionId>,
}

impl RevisionScope {
    #[must_use]
    pub fn new(meta: RevisionMeta) -> Self {
        Self {
            meta,
            revision: None,
        }
    }

    /// The revision opened so far, if any snapshot was written.
    #[must_use]
    pub fn revision(&self) -> Option<RevisionId> {
        self.revision
    }

    /// Append a snapshot of `record` under this scope's revision.
    pub fn snapshot<S: AttributeStore + ?Sized>(
        &mut self,
        store: &mut S,
        record: &AttributeRecord,
    ) -> Result<VersionEntry, AttestaError> {
        let revision = match self.revision {
            Some(id) => id,
            None => {
                let revision = store.begin_revision(&self.meta)?;
                self.revision = Some(revision.id);
                revision.id
            }
        };
        store.append_version(revision, record)
    }
}

// =============================================================================
// EVIDENCE
// =============================================================================

/// Confidence and resolved sources accompanying a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    pub confidence: Option<Confidence>,
    pub sources: BTreeSet<SourceId>,
}

impl Evidence {
    #[must_use]
    pub fn new(confidence: Option<Confidence>, sources: BTreeSet<SourceId>) -> Self {
        Self {
            confidence,
            sources,
        }
    }
}

/// What an update did to the live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created(RecordId),
    Updated(RecordId),
    Unchanged,
}

impl UpdateOutcome {
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(self, UpdateOutcome::Unchanged)
    }
}

/// Validate one posted field against its definition.
///
/// Checks, in order: confidence level range, missing sources (for fields
/// that require them), missing confidence, then coercion. Source ids that do
/// not resolve do not count as sources.
pub(crate) fn check_input<S: AttributeStore + ?Sized>(
    store: &S,
    def: &FieldDef,
    input: &FieldInput,
) -> Result<Result<ValidatedField, FieldError>, AttestaError> {
    let confidence = match input.confidence {
        None | Some(0) => None,
        Some(level) => match Confidence::from_level(level) {
            Some(confidence) => Some(confidence),
            None => {
                return Ok(Err(FieldError::InvalidValue(format!(
                    "Select a valid confidence level. {} is not one of the available choices",
                    level
                ))));
            }
        },
    };

    let has_value = !input.value.is_empty();
    if has_value && def.policy.requires_source() {
        let mut known = 0usize;
        for &id in &input.sources {
            if store.get_source(id)?.is_some() {
                known += 1;
            }
        }
        if known == 0 {
            return Ok(Err(FieldError::MissingSource));
        }
        if confidence.is_none() {
            return Ok(Err(FieldError::MissingConfidence));
        }
    }

    let value = match coerce(store, def, &input.value)? {
        Ok(value) => value,
        Err(error) => return Ok(Err(error)),
    };

    let sourced = def.policy.is_sourced() && !value.is_empty();
    Ok(Ok(ValidatedField {
        value,
        confidence: if sourced { confidence } else { None },
        sources: if sourced {
            input.sources.clone()
        } else {
            Vec::new()
        },
    }))
}

// =============================================================================
// COMPLEX FIELD
// =============================================================================

/// Accessor for one single-valued field (or one list member) of an entity.
#[derive(Debug, Clone, Copy)]
pub struct ComplexField {
    entity: EntityId,
    def: &'static FieldDef,
    member: Option<RecordId>,
}

impl ComplexField {
    #[must_use]
    pub fn new(entity: EntityId, def: &'static FieldDef) -> Self {
        Self {
            entity,
            def,
            member: None,
        }
    }

    /// An accessor scoped to one member record of a list field.
    #[must_use]
    pub fn member(entity: EntityId, def: &'static FieldDef, record: RecordId) -> Self {
        Self {
            entity,
            def,
            member: Some(record),
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    #[must_use]
    pub fn def(&self) -> &'static FieldDef {
        self.def
    }

    /// The member record this accessor is scoped to, for list members.
    #[must_use]
    pub fn member_id(&self) -> Option<RecordId> {
        self.member
    }

    /// The language column a record for `lang` is stored under.
    pub(crate) fn language_key(&self, lang: &Language) -> Option<Language> {
        self.def.policy.translated.then(|| lang.clone())
    }

    /// The live record for exactly `lang`, without fallback.
    fn live_record<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Option<AttributeRecord>, AttestaError> {
        if let Some(id) = self.member {
            return store.get_record(id);
        }
        let key = self.language_key(lang);
        Ok(store
            .records(self.entity, self.def.model)?
            .into_iter()
            .find(|record| record.language == key))
    }

    // ----- read surface -----

    /// The live record for `lang`, falling back to the default language when
    /// the field is translated and no record exists for `lang`.
    pub fn get_value<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Option<AttributeRecord>, AttestaError> {
        if let Some(record) = self.live_record(store, lang)? {
            return Ok(Some(record));
        }
        if self.def.policy.translated && lang.as_str() != FALLBACK_LANGUAGE {
            return self.live_record(store, &Language::fallback());
        }
        Ok(None)
    }

    /// Sources of the live record. Empty for unsourced fields.
    pub fn get_sources<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<BTreeSet<SourceId>, AttestaError> {
        if !self.def.policy.is_sourced() {
            return Ok(BTreeSet::new());
        }
        Ok(self
            .get_value(store, lang)?
            .map(|record| record.sources)
            .unwrap_or_default())
    }

    /// Confidence of the live record, `Low` when unset.
    pub fn get_confidence<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Confidence, AttestaError> {
        Ok(self
            .get_value(store, lang)?
            .and_then(|record| record.confidence)
            .unwrap_or_else(Confidence::lowest))
    }

    /// Every language variant of this field.
    pub fn get_translations<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<AttributeRecord>, AttestaError> {
        if let Some(id) = self.member {
            return Ok(store.get_record(id)?.into_iter().collect());
        }
        let mut records = store.records(self.entity, self.def.model)?;
        records.sort_by(|a, b| a.language.cmp(&b.language));
        Ok(records)
    }

    /// Snapshots of the record for `lang` with their revisions, oldest first.
    pub fn get_history<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Vec<(VersionEntry, Revision)>, AttestaError> {
        let Some(record) = self.live_record(store, lang)? else {
            return Ok(Vec::new());
        };
        store
            .versions_for_record(record.id)?
            .into_iter()
            .map(|version| -> Result<(VersionEntry, Revision), AttestaError> {
                let revision = store
                    .get_revision(version.revision)?
                    .ok_or(AttestaError::RevisionNotFound(version.revision))?;
                Ok((version, revision))
            })
            .collect()
    }

    /// Whether the live record for `lang` cites exactly `sources`.
    pub fn has_same_sources<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
        sources: &BTreeSet<SourceId>,
    ) -> Result<bool, AttestaError> {
        Ok(self
            .live_record(store, lang)?
            .is_some_and(|record| record.sources == *sources))
    }

    // ----- write surface -----

    /// Validate posted input. See `check_input` for the order of checks.
    pub fn validate<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        input: &FieldInput,
    ) -> Result<Result<ValidatedField, FieldError>, AttestaError> {
        check_input(store, self.def, input)
    }

    /// The state a write of `value` with `evidence` stores.
    ///
    /// Empty values carry no sources or confidence; unsourced fields never
    /// keep them.
    pub(crate) fn target_state(
        &self,
        language: Option<Language>,
        value: Option<FieldValue>,
        evidence: Evidence,
    ) -> RecordState {
        let value = value.filter(|v| !v.is_empty());
        let keep = value.is_some() && self.def.policy.is_sourced();
        RecordState {
            language,
            value,
            confidence: if keep { evidence.confidence } else { None },
            sources: if keep { evidence.sources } else { BTreeSet::new() },
        }
    }

    fn record_version<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        record: &AttributeRecord,
    ) -> Result<(), AttestaError> {
        if self.def.policy.versioned {
            scope.snapshot(store, record)?;
        }
        Ok(())
    }

    /// Write `value` for `lang`. Idempotent: an identical write is a no-op.
    pub fn update<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        lang: &Language,
        value: Option<FieldValue>,
        evidence: Evidence,
    ) -> Result<UpdateOutcome, AttestaError> {
        let Some(mut record) = self.live_record(store, lang)? else {
            let state = self.target_state(self.language_key(lang), value, evidence);
            return self.update_new(store, scope, state);
        };

        let state = self.target_state(record.language.clone(), value, evidence);
        let value_changed = record.value != state.value;
        let provenance_changed =
            record.sources != state.sources || record.confidence != state.confidence;

        if !value_changed && !provenance_changed {
            debug!(field = %self.def.key(), record = %record.id, "unchanged, skipping write");
            return Ok(UpdateOutcome::Unchanged);
        }

        if value_changed
            && self.def.policy.translated
            && self.member.is_none()
            && self.is_canonical(store, &record)?
        {
            self.invalidate_translations(store, scope, &record, &state)?;
        }

        record.apply(state);
        store.put_record(&record)?;
        self.record_version(store, scope, &record)?;
        debug!(
            field = %self.def.key(),
            record = %record.id,
            value_changed,
            provenance_changed,
            "updated record"
        );
        Ok(UpdateOutcome::Updated(record.id))
    }

    /// Create the first record for a language. Empty values create nothing.
    pub(crate) fn update_new<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        state: RecordState,
    ) -> Result<UpdateOutcome, AttestaError> {
        if state.value.is_none() {
            debug!(field = %self.def.key(), "empty value, no record created");
            return Ok(UpdateOutcome::Unchanged);
        }
        let record = store.insert_record(RecordDraft {
            entity: self.entity,
            field: self.def.model.to_string(),
            state,
        })?;
        self.record_version(store, scope, &record)?;
        debug!(field = %self.def.key(), record = %record.id, "created record");
        Ok(UpdateOutcome::Created(record.id))
    }

    /// The canonical variant is the field's first-created record.
    fn is_canonical<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        record: &AttributeRecord,
    ) -> Result<bool, AttestaError> {
        let first = store
            .records(self.entity, self.def.model)?
            .iter()
            .map(|r| r.id)
            .min();
        Ok(first == Some(record.id))
    }

    /// The underlying fact changed: null every other language variant and,
    /// where its sources differ, give it the new sources and confidence.
    fn invalidate_translations<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        changed: &AttributeRecord,
        state: &RecordState,
    ) -> Result<(), AttestaError> {
        let siblings = store.records(self.entity, self.def.model)?;
        for mut sibling in siblings.into_iter().filter(|r| r.id != changed.id) {
            let mut dirty = sibling.value.take().is_some();
            if sibling.sources != state.sources {
                sibling.sources = state.sources.clone();
                sibling.confidence = state.confidence;
                dirty = true;
            }
            if dirty {
                store.put_record(&sibling)?;
                self.record_version(store, scope, &sibling)?;
                debug!(
                    field = %self.def.key(),
                    record = %sibling.id,
                    language = ?sibling.language,
                    "invalidated translation"
                );
            }
        }
        Ok(())
    }

    /// Add the `lang` variant of a translated field.
    ///
    /// Fails if the field has no record yet, or if `lang` already holds a
    /// value. Sources and confidence are copied from a sourced sibling.
    pub fn translate<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        lang: &Language,
        value: FieldValue,
    ) -> Result<AttributeRecord, AttestaError> {
        if !self.def.policy.translated || self.member.is_some() {
            return Err(AttestaError::NotTranslatable(self.def.key()));
        }
        let records = store.records(self.entity, self.def.model)?;
        if records.is_empty() {
            return Err(AttestaError::FieldDoesNotExist);
        }

        let key = self.language_key(lang);
        let existing = records.iter().find(|r| r.language == key).cloned();
        if existing.as_ref().is_some_and(AttributeRecord::has_value) {
            return Err(AttestaError::AlreadyTranslated);
        }

        let (confidence, sources) = records
            .iter()
            .find(|r| !r.sources.is_empty())
            .map(|r| (r.confidence, r.sources.clone()))
            .unwrap_or_default();
        let state = RecordState {
            language: key,
            value: Some(value),
            confidence,
            sources,
        };

        let record = match existing {
            Some(mut record) => {
                record.apply(state);
                store.put_record(&record)?;
                record
            }
            None => store.insert_record(RecordDraft {
                entity: self.entity,
                field: self.def.model.to_string(),
                state,
            })?,
        };
        self.record_version(store, scope, &record)?;
        info!(field = %self.def.key(), language = %lang, "added translation");
        Ok(record)
    }

    /// Restore the live record to the state captured by `version`.
    pub fn revert<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        version: VersionId,
    ) -> Result<AttributeRecord, AttestaError> {
        let entry = store
            .get_version(version)?
            .ok_or(AttestaError::VersionNotFound(version))?;
        let belongs = entry.entity == self.entity
            && entry.field == self.def.model
            && self.member.is_none_or(|id| id == entry.record);
        if !belongs {
            return Err(AttestaError::VersionNotFound(version));
        }
        self.restore(store, scope, entry)
    }

    /// Restore the record for `lang` to its most recent snapshot citing
    /// exactly `sources`, or failing that, the most recent unsourced one.
    ///
    /// Returns `None` (and writes nothing) when neither exists.
    pub fn revert_to_source<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        lang: &Language,
        sources: &BTreeSet<SourceId>,
    ) -> Result<Option<AttributeRecord>, AttestaError> {
        let record = self
            .live_record(store, lang)?
            .ok_or(AttestaError::FieldDoesNotExist)?;
        let versions = store.versions_for_record(record.id)?;

        let target = versions
            .iter()
            .rev()
            .find(|v| v.state.sources == *sources)
            .or_else(|| versions.iter().rev().find(|v| v.state.sources.is_empty()))
            .cloned();
        match target {
            Some(entry) => self.restore(store, scope, entry).map(Some),
            None => Ok(None),
        }
    }

    fn restore<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        entry: VersionEntry,
    ) -> Result<AttributeRecord, AttestaError> {
        let mut record = store
            .get_record(entry.record)?
            .ok_or(AttestaError::RecordNotFound(entry.record))?;
        record.apply(entry.state);
        store.put_record(&record)?;
        self.record_version(store, scope, &record)?;
        info!(
            field = %self.def.key(),
            record = %record.id,
            version = %entry.id,
            "reverted record"
        );
        Ok(record)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, ORGANIZATION};
    use crate::storage::MemoryStore;
    use crate::types::{EntityKind, SourceDraft};

    struct Fixture {
        store: MemoryStore,
        name: ComplexField,
        src1: SourceId,
        src2: SourceId,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::new();
        let org = store
            .insert_entity(EntityKind::Organization)
            .expect("insert");
        let src1 = store
            .insert_source(SourceDraft::new("Premium Times"))
            .expect("source")
            .id;
        let src2 = store
            .insert_source(SourceDraft::new("Daily Trust"))
            .expect("source")
            .id;
        let def = ORGANIZATION.field("OrganizationName").expect("field");
        Fixture {
            store,
            name: ComplexField::new(org.id, def),
            src1,
            src2,
        }
    }

    fn lang(tag: &str) -> Language {
        Language::new(tag).expect("language")
    }

    fn text(s: &str) -> Option<FieldValue> {
        Some(FieldValue::Text(s.to_string()))
    }

    fn cited(ids: &[SourceId]) -> Evidence {
        Evidence::new(Some(Confidence::High), ids.iter().copied().collect())
    }

    fn scope() -> RevisionScope {
        RevisionScope::new(RevisionMeta::new(Some("tester".to_string()), "test"))
    }

    #[test]
    fn missing_field_reads_as_none() {
        let f = fixture();
        assert!(f.name.get_value(&f.store, &lang("en")).expect("get").is_none());
        assert_eq!(
            f.name.get_confidence(&f.store, &lang("en")).expect("get"),
            Confidence::Low
        );
        assert!(f.name.get_sources(&f.store, &lang("en")).expect("get").is_empty());
    }

    #[test]
    fn update_is_idempotent() {
        let mut f = fixture();
        let mut s = scope();
        let en = lang("en");

        let first = f
            .name
            .update(&mut f.store, &mut s, &en, text("Acme"), cited(&[f.src1]))
            .expect("update");
        assert!(matches!(first, UpdateOutcome::Created(_)));
        let versions = f.store.version_count();

        let second = f
            .name
            .update(&mut f.store, &mut s, &en, text("Acme"), cited(&[f.src1]))
            .expect("update");
        assert_eq!(second, UpdateOutcome::Unchanged);
        assert_eq!(f.store.record_count(), 1);
        assert_eq!(f.store.version_count(), versions);
    }

    #[test]
    fn source_change_alone_is_a_write() {
        let mut f = fixture();
        let mut s = scope();
        let en = lang("en");
        f.name
            .update(&mut f.store, &mut s, &en, text("Acme"), cited(&[f.src1]))
            .expect("update");

        let outcome = f
            .name
            .update(&mut f.store, &mut s, &en, text("Acme"), cited(&[f.src2]))
            .expect("update");
        assert!(outcome.is_write());
        assert_eq!(
            f.name.get_sources(&f.store, &en).expect("get"),
            BTreeSet::from([f.src2])
        );
        assert!(f.name.has_same_sources(&f.store, &en, &BTreeSet::from([f.src2])).expect("check"));
    }

    #[test]
    fn translated_value_falls_back_to_english() {
        let mut f = fixture();
        let mut s = scope();
        f.name
            .update(&mut f.store, &mut s, &lang("en"), text("Acme"), cited(&[f.src1]))
            .expect("update");

        let record = f.name.get_value(&f.store, &lang("fr")).expect("get");
        assert_eq!(record.and_then(|r| r.value), text("Acme"));
    }

    #[test]
    fn changed_value_invalidates_other_languages() {
        let mut f = fixture();
        let mut s = scope();
        let (en, fr) = (lang("en"), lang("fr"));
        f.name
            .update(&mut f.store, &mut s, &en, text("Acme"), cited(&[f.src1]))
            .expect("update");
        let french = f
            .name
            .translate(&mut f.store, &mut s, &fr, FieldValue::Text("Acmé".to_string()))
            .expect("translate");
        assert_eq!(french.sources, BTreeSet::from([f.src1]));

        f.name
            .update(&mut f.store, &mut s, &en, text("Acme Corp"), cited(&[f.src2]))
            .expect("update");

        let after = f
            .name
            .get_value(&f.store, &fr)
            .expect("get")
            .expect("fr record kept");
        assert_eq!(after.id, french.id);
        assert_eq!(after.value, None);
        assert_eq!(after.sources, BTreeSet::from([f.src2]));
    }

    #[test]
    fn translation_edit_leaves_canonical_value() {
        let mut f = fixture();
        let mut s = scope();
        let (en, fr) = (lang("en"), lang("fr"));
        f.name
            .update(&mut f.store, &mut s, &en, text("Acme"), cited(&[f.src1]))
            .expect("update");
        f.name
            .translate(&mut f.store, &mut s, &fr, FieldValue::Text("Acmé".to_string()))
            .expect("translate");

        f.name
            .update(&mut f.store, &mut s, &fr, text("Acme SA"), cited(&[f.src2]))
            .expect("update");

        let english = f.name.get_value(&f.store, &en).expect("get").expect("en record");
        assert_eq!(english.value, text("Acme"));
        assert_eq!(english.sources, BTreeSet::from([f.src1]));
        let french = f.name.get_value(&f.store, &fr).expect("get").expect("fr record");
        assert_eq!(french.value, text("Acme SA"));
    }

    #[test]
    fn translate_guards() {
        let mut f = fixture();
        let mut s = scope();
        let fr = lang("fr");

        let missing = f
            .name
            .translate(&mut f.store, &mut s, &fr, FieldValue::Text("Acmé".to_string()));
        assert!(matches!(missing, Err(AttestaError::FieldDoesNotExist)));

        f.name
            .update(&mut f.store, &mut s, &lang("en"), text("Acme"), cited(&[f.src1]))
            .expect("update");
        f.name
            .translate(&mut f.store, &mut s, &fr, FieldValue::Text("Acmé".to_string()))
            .expect("translate");
        let again = f
            .name
            .translate(&mut f.store, &mut s, &fr, FieldValue::Text("Acme SA".to_string()));
        assert!(matches!(again, Err(AttestaError::AlreadyTranslated)));
    }

    #[test]
    fn untranslated_field_rejects_translate() {
        let mut store = MemoryStore::new();
        let org = store
            .insert_entity(EntityKind::Organization)
            .expect("insert");
        let def = EntitySchema::of(EntityKind::Organization)
            .field("OrganizationFoundingDate")
            .expect("field");
        let field = ComplexField::new(org.id, def);
        let result = field.translate(&mut store, &mut scope(), &lang("fr"), FieldValue::Bool(true));
        assert!(matches!(result, Err(AttestaError::NotTranslatable(_))));
    }

    #[test]
    fn revert_to_source_requires_exact_set() {
        let mut f = fixture();
        let mut s = scope();
        let en = lang("en");
        f.name
            .update(&mut f.store, &mut s, &en, text("A"), cited(&[f.src1]))
            .expect("update");
        f.name
            .update(&mut f.store, &mut s, &en, text("B"), cited(&[f.src1, f.src2]))
            .expect("update");
        f.name
            .update(&mut f.store, &mut s, &en, text("C"), cited(&[f.src2]))
            .expect("update");

        let restored = f
            .name
            .revert_to_source(&mut f.store, &mut s, &en, &BTreeSet::from([f.src1]))
            .expect("revert")
            .expect("exact match");
        assert_eq!(restored.value, text("A"));

        // Overlapping but non-identical sets never match.
        let none = f
            .name
            .revert_to_source(
                &mut f.store,
                &mut s,
                &en,
                &BTreeSet::from([f.src1, f.src2, SourceId(99)]),
            )
            .expect("revert");
        assert!(none.is_none());
    }

    #[test]
    fn revert_to_source_falls_back_to_unsourced_snapshot() {
        let mut f = fixture();
        let mut s = scope();
        let en = lang("en");
        f.name
            .update(&mut f.store, &mut s, &en, text("A"), cited(&[f.src1]))
            .expect("update");
        f.name
            .update(&mut f.store, &mut s, &en, None, cited(&[f.src1]))
            .expect("update");
        f.name
            .update(&mut f.store, &mut s, &en, text("C"), cited(&[f.src2]))
            .expect("update");

        let restored = f
            .name
            .revert_to_source(
                &mut f.store,
                &mut s,
                &en,
                &BTreeSet::from([f.src2, SourceId(99)]),
            )
            .expect("revert")
            .expect("unsourced snapshot");
        assert_eq!(restored.value, None);
        assert!(restored.sources.is_empty());
        assert_eq!(restored.confidence, None);
        assert!(f.name.get_value(&f.store, &en).expect("get").is_some_and(|r| r.value.is_none()));
    }

    #[test]
    fn revert_restores_snapshot_and_records_history() {
        let mut f = fixture();
        let mut s = scope();
        let en = lang("en");
        f.name
            .update(&mut f.store, &mut s, &en, text("A"), cited(&[f.src1]))
            .expect("update");
        f.name
            .update(&mut f.store, &mut s, &en, text("B"), cited(&[f.src1]))
            .expect("update");

        let history = f.name.get_history(&f.store, &en).expect("history");
        assert_eq!(history.len(), 2);
        let (first, revision) = &history[0];
        assert_eq!(first.state.value, text("A"));
        assert_eq!(revision.editor.as_deref(), Some("tester"));

        let restored = f
            .name
            .revert(&mut f.store, &mut s, first.id)
            .expect("revert");
        assert_eq!(restored.value, text("A"));
        assert_eq!(f.name.get_history(&f.store, &en).expect("history").len(), 3);

        assert!(matches!(
            f.name.revert(&mut f.store, &mut s, VersionId(999)),
            Err(AttestaError::VersionNotFound(_))
        ));
    }

    #[test]
    fn scope_opens_one_revision_lazily() {
        let mut f = fixture();
        let mut s = scope();
        assert!(s.revision().is_none());

        f.name
            .update(&mut f.store, &mut s, &lang("en"), None, Evidence::default())
            .expect("update");
        assert!(s.revision().is_none());
        assert_eq!(f.store.revision_count(), 0);

        f.name
            .update(&mut f.store, &mut s, &lang("en"), text("A"), cited(&[f.src1]))
            .expect("update");
        f.name
            .update(&mut f.store, &mut s, &lang("en"), text("B"), cited(&[f.src1]))
            .expect("update");
        assert!(s.revision().is_some());
        assert_eq!(f.store.revision_count(), 1);
    }
}

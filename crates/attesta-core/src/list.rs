//! # Complex Field List
//!
//! The multi-value accessor: a field holding 0..N concurrently valid
//! values (aliases, classifications, violation types), each member its own
//! independently sourced `AttributeRecord`.
//!
//! Posting a list replaces the stored set:
//! - values already stored keep their record (provenance may be updated)
//! - new values create a member record, snapshotted like any creation
//! - stored values absent from the post are hard-deleted, with no snapshot

use crate::entity::{FieldInput, ValidatedField};
use crate::field::{ComplexField, Evidence, RevisionScope, UpdateOutcome, check_input};
use crate::policy::FieldDef;
use crate::primitives::FALLBACK_LANGUAGE;
use crate::store::AttributeStore;
use crate::types::{
    AttestaError, AttributeRecord, EntityId, FieldError, FieldValue, Language, RecordId,
};
use std::collections::BTreeSet;
use tracing::debug;

/// What a list update did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutcome {
    pub added: Vec<RecordId>,
    pub updated: Vec<RecordId>,
    pub removed: Vec<RecordId>,
}

impl ListOutcome {
    #[must_use]
    pub fn is_write(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// Accessor for one list field of an entity.
#[derive(Debug, Clone, Copy)]
pub struct ComplexFieldList {
    entity: EntityId,
    def: &'static FieldDef,
}

impl ComplexFieldList {
    #[must_use]
    pub fn new(entity: EntityId, def: &'static FieldDef) -> Self {
        Self { entity, def }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    #[must_use]
    pub fn def(&self) -> &'static FieldDef {
        self.def
    }

    fn live_records<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Vec<AttributeRecord>, AttestaError> {
        let key = self.def.policy.translated.then(|| lang.clone());
        Ok(store
            .records(self.entity, self.def.model)?
            .into_iter()
            .filter(|record| record.language == key)
            .collect())
    }

    /// Members for `lang`, ordered by value. Translated lists with no members
    /// in `lang` fall back to the default language.
    pub fn get_list<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Vec<ComplexField>, AttestaError> {
        let mut records = self.live_records(store, lang)?;
        if records.is_empty() && self.def.policy.translated && lang.as_str() != FALLBACK_LANGUAGE
        {
            records = self.live_records(store, &Language::fallback())?;
        }
        records.sort_by(|a, b| a.value.cmp(&b.value).then(a.id.cmp(&b.id)));
        Ok(records
            .into_iter()
            .map(|record| ComplexField::member(self.entity, self.def, record.id))
            .collect())
    }

    /// Current member values for `lang`, ordered.
    pub fn get_values<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        lang: &Language,
    ) -> Result<Vec<FieldValue>, AttestaError> {
        let mut values = Vec::new();
        for member in self.get_list(store, lang)? {
            if let Some(value) = member.get_value(store, lang)?.and_then(|r| r.value) {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// An accessor scoped to one member.
    #[must_use]
    pub fn get_complex_field(&self, member: RecordId) -> ComplexField {
        ComplexField::member(self.entity, self.def, member)
    }

    pub fn validate<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        input: &FieldInput,
    ) -> Result<Result<ValidatedField, FieldError>, AttestaError> {
        check_input(store, self.def, input)
    }

    /// Replace the stored members for `lang` with `values`.
    pub fn update<S: AttributeStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &mut RevisionScope,
        lang: &Language,
        values: &[FieldValue],
        evidence: &Evidence,
    ) -> Result<ListOutcome, AttestaError> {
        let wanted: BTreeSet<&FieldValue> = values.iter().filter(|v| !v.is_empty()).collect();
        let mut kept: BTreeSet<FieldValue> = BTreeSet::new();
        let mut outcome = ListOutcome::default();

        for record in self.live_records(store, lang)? {
            match record.value {
                Some(value) if wanted.contains(&value) && !kept.contains(&value) => {
                    let member = self.get_complex_field(record.id);
                    let result =
                        member.update(store, scope, lang, Some(value.clone()), evidence.clone())?;
                    if result.is_write() {
                        outcome.updated.push(record.id);
                    }
                    kept.insert(value);
                }
                _ => {
                    store.delete_record(record.id)?;
                    debug!(field = %self.def.key(), record = %record.id, "removed list member");
                    outcome.removed.push(record.id);
                }
            }
        }

        let creator = ComplexField::new(self.entity, self.def);
        for value in wanted.into_iter().filter(|v| !kept.contains(*v)) {
            let state = creator.target_state(
                creator.language_key(lang),
                Some(value.clone()),
                evidence.clone(),
            );
            if let UpdateOutcome::Created(id) = creator.update_new(store, scope, state)? {
                outcome.added.push(id);
            }
        }
        Ok(outcome)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ORGANIZATION;
    use crate::storage::MemoryStore;
    use crate::types::{Confidence, EntityKind, RevisionMeta, SourceDraft, SourceId};

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn setup(model: &str) -> (MemoryStore, ComplexFieldList, Evidence) {
        let mut store = MemoryStore::new();
        let org = store
            .insert_entity(EntityKind::Organization)
            .expect("insert");
        let src: SourceId = store
            .insert_source(SourceDraft::new("Vanguard"))
            .expect("source")
            .id;
        let def = ORGANIZATION.field(model).expect("field");
        let evidence = Evidence::new(Some(Confidence::Medium), BTreeSet::from([src]));
        (store, ComplexFieldList::new(org.id, def), evidence)
    }

    fn scope() -> RevisionScope {
        RevisionScope::new(RevisionMeta::default())
    }

    #[test]
    fn members_are_ordered_by_value() {
        let (mut store, list, evidence) = setup("OrganizationClassification");
        let en = Language::fallback();
        list.update(
            &mut store,
            &mut scope(),
            &en,
            &[text("Police"), text("Army"), text("Navy")],
            &evidence,
        )
        .expect("update");

        assert_eq!(
            list.get_values(&store, &en).expect("values"),
            vec![text("Army"), text("Navy"), text("Police")]
        );
    }

    #[test]
    fn removal_is_a_hard_delete_without_snapshot() {
        let (mut store, list, evidence) = setup("OrganizationClassification");
        let en = Language::fallback();
        let first = list
            .update(&mut store, &mut scope(), &en, &[text("Army"), text("Police")], &evidence)
            .expect("update");
        assert_eq!(first.added.len(), 2);
        let versions = store.version_count();

        let second = list
            .update(&mut store, &mut scope(), &en, &[text("Army")], &evidence)
            .expect("update");
        assert_eq!(second.removed.len(), 1);
        assert!(second.added.is_empty());
        assert!(second.updated.is_empty());

        assert_eq!(store.record_count(), 1);
        assert_eq!(store.version_count(), versions);
        assert!(store.get_record(second.removed[0]).expect("get").is_none());
    }

    #[test]
    fn unchanged_post_is_a_no_op() {
        let (mut store, list, evidence) = setup("OrganizationClassification");
        let en = Language::fallback();
        list.update(&mut store, &mut scope(), &en, &[text("Army")], &evidence)
            .expect("update");

        let again = list
            .update(&mut store, &mut scope(), &en, &[text("Army")], &evidence)
            .expect("update");
        assert!(!again.is_write());
    }

    #[test]
    fn member_accessor_reads_one_record() {
        let (mut store, list, evidence) = setup("OrganizationAlias");
        let en = Language::fallback();
        let outcome = list
            .update(&mut store, &mut scope(), &en, &[text("ACME")], &evidence)
            .expect("update");

        let member = list.get_complex_field(outcome.added[0]);
        let record = member.get_value(&store, &en).expect("get").expect("member");
        assert_eq!(record.value, Some(text("ACME")));
        assert_eq!(member.get_confidence(&store, &en).expect("get"), Confidence::Medium);
    }

    #[test]
    fn translated_list_falls_back_to_english() {
        let (mut store, list, evidence) = setup("OrganizationAlias");
        list.update(
            &mut store,
            &mut scope(),
            &Language::fallback(),
            &[text("ACME")],
            &evidence,
        )
        .expect("update");

        let fr = Language::new("fr").expect("language");
        assert_eq!(list.get_values(&store, &fr).expect("values"), vec![text("ACME")]);
    }
}

//! # History
//!
//! Reconstructs the sequence of states an entity went through and diffs
//! consecutive states for changelog display.
//!
//! ## Flattened state
//!
//! The state at a revision is every field value live after that revision,
//! keyed by field model name. When a model name occurs more than once (list
//! members, or several language variants) its values accumulate into a set.
//!
//! ```text
//! rev 1  { OrganizationName: "Acme" }
//! rev 2  { OrganizationName: "Acme Corp",
//!          OrganizationAlias: {"ACME", "AC"} }
//! ```
//!
//! List members deleted by a list update leave no snapshot, so they stay
//! in the reconstructed state of every later revision.

use crate::store::AttributeStore;
use crate::types::{AttestaError, EntityId, RecordId, Revision, RevisionId, VersionEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The value of one key in a flattened state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Single(String),
    Set(BTreeSet<String>),
}

impl StateValue {
    fn accumulate(&mut self, value: String) {
        match self {
            StateValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = StateValue::Set(BTreeSet::from([first, value]));
            }
            StateValue::Set(values) => {
                values.insert(value);
            }
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Single(value) => f.write_str(value),
            StateValue::Set(values) => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", joined.join(", "))
            }
        }
    }
}

/// All field values of an entity at one revision.
pub type FlattenedState = BTreeMap<String, StateValue>;

fn flatten<'a>(entries: impl Iterator<Item = &'a VersionEntry>) -> FlattenedState {
    let mut state = FlattenedState::new();
    for entry in entries {
        let Some(value) = entry.state.value.as_ref() else {
            continue;
        };
        let value = value.to_string();
        match state.get_mut(&entry.field) {
            Some(existing) => existing.accumulate(value),
            None => {
                state.insert(entry.field.clone(), StateValue::Single(value));
            }
        }
    }
    state
}

// =============================================================================
// REVISIONS
// =============================================================================

/// Lazy iterator over `(state, revision)` pairs, oldest first.
///
/// Revision metadata is fetched from the store one step at a time.
pub struct Revisions<'a, S: ?Sized> {
    store: &'a S,
    pending: btree_map::IntoIter<RevisionId, Vec<VersionEntry>>,
    live: BTreeMap<RecordId, VersionEntry>,
}

impl<S: AttributeStore + ?Sized> Iterator for Revisions<'_, S> {
    type Item = Result<(FlattenedState, Revision), AttestaError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, entries) = self.pending.next()?;
        for entry in entries {
            self.live.insert(entry.record, entry);
        }
        let revision = match self.store.get_revision(id) {
            Ok(Some(revision)) => revision,
            Ok(None) => return Some(Err(AttestaError::RevisionNotFound(id))),
            Err(e) => return Some(Err(e)),
        };
        Some(Ok((flatten(self.live.values()), revision)))
    }
}

/// The states of `entity`, one per revision that touched any of its fields.
pub fn get_revisions<S: AttributeStore + ?Sized>(
    store: &S,
    entity: EntityId,
) -> Result<Revisions<'_, S>, AttestaError> {
    let mut grouped: BTreeMap<RevisionId, Vec<VersionEntry>> = BTreeMap::new();
    for entry in store.versions_for_entity(entity)? {
        grouped.entry(entry.revision).or_default().push(entry);
    }
    Ok(Revisions {
        store,
        pending: grouped.into_iter(),
        live: BTreeMap::new(),
    })
}

// =============================================================================
// DIFFERENCES
// =============================================================================

/// The change between two consecutive revisions.
///
/// `editor`, `comment` and `timestamp` are those of the earlier revision
/// (`from`). Use `to` to look up the revision that made the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    pub from: RevisionId,
    pub to: RevisionId,
    pub editor: Option<String>,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    pub added: BTreeMap<String, StateValue>,
    pub removed: BTreeMap<String, StateValue>,
    pub changed: BTreeMap<String, (StateValue, StateValue)>,
}

impl Difference {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diff each consecutive pair of revisions.
#[must_use]
pub fn get_differences(revisions: &[(FlattenedState, Revision)]) -> Vec<Difference> {
    revisions
        .windows(2)
        .map(|pair| {
            let (old, earlier) = &pair[0];
            let (new, later) = &pair[1];

            let added = new
                .iter()
                .filter(|(key, _)| !old.contains_key(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let removed = old
                .iter()
                .filter(|(key, _)| !new.contains_key(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let changed = old
                .iter()
                .filter_map(|(key, before)| {
                    let after = new.get(key)?;
                    (after != before).then(|| (key.clone(), (before.clone(), after.clone())))
                })
                .collect();

            Difference {
                from: earlier.id,
                to: later.id,
                editor: earlier.editor.clone(),
                comment: earlier.comment.clone(),
                timestamp: earlier.created_at,
                added,
                removed,
                changed,
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::RawValue;
    use crate::entity::{Entity, FieldInput, FieldMap};
    use crate::storage::MemoryStore;
    use crate::types::{EntityKind, Language, RevisionMeta, SourceDraft, SourceId};

    fn post(
        store: &mut MemoryStore,
        entity: Option<&Entity>,
        fields: &[(&str, RawValue)],
        src: SourceId,
        editor: &str,
    ) -> Entity {
        let map: FieldMap = fields
            .iter()
            .map(|(key, value)| {
                (
                    (*key).to_string(),
                    FieldInput::new(value.clone()).with_confidence(2).with_sources([src]),
                )
            })
            .collect();
        let en = Language::fallback();
        let meta = RevisionMeta::new(Some(editor.to_string()), format!("edit by {}", editor));
        match entity {
            Some(entity) => {
                let (errors, validated) = entity.validate(&*store, &map).expect("validate");
                assert!(errors.is_empty(), "{:?}", errors);
                entity.update(store, &validated, &en, meta).expect("update");
                entity.clone()
            }
            None => {
                let (errors, validated) =
                    Entity::validate_new(&*store, EntityKind::Organization, &map).expect("validate");
                assert!(errors.is_empty(), "{:?}", errors);
                Entity::create(store, EntityKind::Organization, &validated, &en, meta)
                    .expect("create")
            }
        }
    }

    fn history_fixture() -> (MemoryStore, Entity) {
        let mut store = MemoryStore::new();
        let src = store
            .insert_source(SourceDraft::new("Vanguard"))
            .expect("source")
            .id;
        let org = post(
            &mut store,
            None,
            &[("Organization_OrganizationName", "Acme".into())],
            src,
            "ana",
        );
        post(
            &mut store,
            Some(&org),
            &[
                ("Organization_OrganizationName", "Acme Corp".into()),
                (
                    "Organization_OrganizationAlias",
                    RawValue::List(vec!["ACME".into(), "AC".into()]),
                ),
            ],
            src,
            "ben",
        );
        (store, org)
    }

    #[test]
    fn revisions_accumulate_state() {
        let (store, org) = history_fixture();
        let revisions: Vec<_> = get_revisions(&store, org.id())
            .expect("revisions")
            .collect::<Result<_, _>>()
            .expect("collect");
        assert_eq!(revisions.len(), 2);

        let (first, rev1) = &revisions[0];
        assert_eq!(rev1.editor.as_deref(), Some("ana"));
        assert_eq!(
            first.get("OrganizationName"),
            Some(&StateValue::Single("Acme".to_string()))
        );

        let (second, _) = &revisions[1];
        assert_eq!(
            second.get("OrganizationName"),
            Some(&StateValue::Single("Acme Corp".to_string()))
        );
        assert_eq!(
            second.get("OrganizationAlias"),
            Some(&StateValue::Set(BTreeSet::from([
                "AC".to_string(),
                "ACME".to_string()
            ])))
        );
    }

    #[test]
    fn differences_carry_earlier_metadata() {
        let (store, org) = history_fixture();
        let revisions: Vec<_> = get_revisions(&store, org.id())
            .expect("revisions")
            .collect::<Result<_, _>>()
            .expect("collect");

        let diffs = get_differences(&revisions);
        assert_eq!(diffs.len(), 1);
        let diff = &diffs[0];
        assert_eq!(diff.from, revisions[0].1.id);
        assert_eq!(diff.to, revisions[1].1.id);
        assert_eq!(diff.editor.as_deref(), Some("ana"));
        assert!(diff.added.contains_key("OrganizationAlias"));
        assert!(diff.removed.is_empty());
        assert_eq!(
            diff.changed.get("OrganizationName"),
            Some(&(
                StateValue::Single("Acme".to_string()),
                StateValue::Single("Acme Corp".to_string())
            ))
        );
    }

    #[test]
    fn untouched_entity_has_no_revisions() {
        let mut store = MemoryStore::new();
        let row = store.insert_entity(EntityKind::Person).expect("insert");
        assert_eq!(get_revisions(&store, row.id).expect("revisions").count(), 0);
        assert!(get_differences(&[]).is_empty());
    }

    #[test]
    fn set_display_is_sorted() {
        let value = StateValue::Set(BTreeSet::from(["b".to_string(), "a".to_string()]));
        assert_eq!(value.to_string(), "{a, b}");
    }
}

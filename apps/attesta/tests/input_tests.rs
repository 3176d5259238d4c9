//! Tests for mapping-file parsing and its hand-off to the engine.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use attesta::input::{MAX_MAPPING_FILE_SIZE, errors_to_json};
use attesta::{parse_mapping, parse_source_ids, read_mapping};
use attesta_core::{
    AttributeStore, Entity, EntityKind, FieldError, FieldInput, FieldValue, Language, MemoryStore,
    RawValue, RevisionMeta, SourceDraft, SourceId, ValidationErrors,
};
use std::collections::BTreeSet;
use tempfile::tempdir;

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn test_full_entry() {
    let map = parse_mapping(
        r#"{"Organization_OrganizationName": {"value": "Acme", "confidence": 3, "sources": [1, 2]}}"#,
    )
    .unwrap();

    assert_eq!(
        map["Organization_OrganizationName"],
        FieldInput::new("Acme")
            .with_confidence(3)
            .with_sources([SourceId(1), SourceId(2)])
    );
}

#[test]
fn test_bare_entries() {
    let map = parse_mapping(
        r#"{
            "Violation_ViolationDescription": "Detention",
            "Organization_OrganizationRealFounding": true,
            "Emplacement_EmplacementSite": 4,
            "Violation_ViolationEndDate": null
        }"#,
    )
    .unwrap();

    assert_eq!(map["Violation_ViolationDescription"].value, RawValue::from("Detention"));
    assert_eq!(map["Organization_OrganizationRealFounding"].value, RawValue::Bool(true));
    assert_eq!(map["Emplacement_EmplacementSite"].value, RawValue::Int(4));
    assert_eq!(map["Violation_ViolationEndDate"].value, RawValue::Null);
    assert_eq!(map["Violation_ViolationDescription"].confidence, None);
}

#[test]
fn test_single_member_list_stays_a_list() {
    let map = parse_mapping(r#"{"Violation_ViolationType": ["Detention"]}"#).unwrap();
    assert_eq!(
        map["Violation_ViolationType"].value,
        RawValue::List(vec![RawValue::from("Detention")])
    );
}

#[test]
fn test_object_without_value_is_empty() {
    let map = parse_mapping(r#"{"Organization_OrganizationName": {"sources": [1]}}"#).unwrap();
    let input = &map["Organization_OrganizationName"];
    assert!(input.value.is_empty());
    assert_eq!(input.sources, vec![SourceId(1)]);
}

#[test]
fn test_malformed_mapping_rejected() {
    assert!(parse_mapping("[1, 2, 3]").is_err());
    assert!(parse_mapping(r#"{"Organization_OrganizationName": 1.5}"#).is_err());
    assert!(parse_mapping("{").is_err());
}

#[test]
fn test_read_mapping_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("acme.json");
    std::fs::write(&path, r#"{"Person_PersonName": "Ada"}"#).unwrap();

    let map = read_mapping(&path).unwrap();
    assert_eq!(map.len(), 1);
    assert!(read_mapping(&dir.path().join("missing.json")).is_err());
    assert!(read_mapping(dir.path()).is_err());
    assert!(MAX_MAPPING_FILE_SIZE > 0);
}

#[test]
fn test_parse_source_ids() {
    assert_eq!(
        parse_source_ids(" 1, 4,7 ,").unwrap(),
        BTreeSet::from([SourceId(1), SourceId(4), SourceId(7)])
    );
    assert!(parse_source_ids("").unwrap().is_empty());
    assert!(parse_source_ids("1,two").is_err());
}

#[test]
fn test_errors_to_json() {
    let errors = ValidationErrors::from([
        (
            "Organization_OrganizationName".to_string(),
            FieldError::RequiredFieldMissing,
        ),
        (
            "Organization_OrganizationFoundingDate".to_string(),
            FieldError::InvalidValue("Enter a valid date".to_string()),
        ),
    ]);
    let json = errors_to_json(&errors);
    assert_eq!(json["Organization_OrganizationName"], "This field is required");
    assert_eq!(json["Organization_OrganizationFoundingDate"], "Enter a valid date");
}

// =============================================================================
// ENGINE HAND-OFF
// =============================================================================

#[test]
fn test_parsed_mapping_creates_entity() {
    let mut store = MemoryStore::new();
    let src = store.insert_source(SourceDraft::new("Vanguard")).unwrap().id;
    let text = format!(
        r#"{{
            "Organization_OrganizationName": {{"value": "Acme", "confidence": 3, "sources": [{src}]}},
            "Organization_OrganizationRealFounding": {{"value": "True", "confidence": 1, "sources": [{src}]}}
        }}"#,
        src = src.0
    );
    let map = parse_mapping(&text).unwrap();

    let (errors, validated) =
        Entity::validate_new(&store, EntityKind::Organization, &map).unwrap();
    assert!(errors.is_empty(), "{:?}", errors);
    let org = Entity::create(
        &mut store,
        EntityKind::Organization,
        &validated,
        &Language::fallback(),
        RevisionMeta::default(),
    )
    .unwrap();

    let real = org
        .field("OrganizationRealFounding")
        .unwrap()
        .get_value(&store, &Language::fallback())
        .unwrap()
        .and_then(|r| r.value);
    assert_eq!(real, Some(FieldValue::Bool(true)));
}

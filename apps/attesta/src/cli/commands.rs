//! # CLI Command Implementations
//!
//! Each command opens the configured store, runs against the engine and,
//! for the file backend, writes the snapshot back.

use attesta::config::{BackendKind, Settings};
use attesta::input::{errors_to_json, parse_source_ids, read_mapping};
use attesta_core::coerce::coerce;
use attesta_core::formats::MAX_SNAPSHOT_SIZE;
use attesta_core::{
    AttestaError, AttributeStore, Coerced, ComplexField, Entity, EntityId, EntityKind,
    FieldAccessor, FieldValue, Language, RawValue, Registry, RevisionMeta, RevisionScope,
    SourceDraft, StorageBackend, ValidationErrors, VersionId, get_differences, get_revisions,
};
use std::path::Path;
use uuid::Uuid;

// =============================================================================
// STORE HANDLING
// =============================================================================

/// Open the configured store, creating an empty one if the file is missing.
pub fn open_store(settings: &Settings) -> Result<StorageBackend, AttestaError> {
    let path = &settings.database;
    match settings.backend {
        BackendKind::Redb => StorageBackend::open_redb(path),
        BackendKind::File => {
            if !path.exists() {
                return Ok(StorageBackend::default());
            }
            let metadata = std::fs::metadata(path)
                .map_err(|e| AttestaError::IoError(format!("Cannot read file metadata: {}", e)))?;
            if metadata.len() > MAX_SNAPSHOT_SIZE as u64 {
                return Err(AttestaError::SerializationError(format!(
                    "File size {} bytes exceeds maximum allowed {} bytes",
                    metadata.len(),
                    MAX_SNAPSHOT_SIZE
                )));
            }
            let data = std::fs::read(path)
                .map_err(|e| AttestaError::IoError(format!("Read db: {}", e)))?;
            StorageBackend::from_snapshot(&data)
        }
    }
}

/// Persist the store. A no-op for redb, which commits on every write.
pub fn save_store(store: &StorageBackend, path: &Path) -> Result<(), AttestaError> {
    match store.to_snapshot()? {
        Some(data) => std::fs::write(path, &data)
            .map_err(|e| AttestaError::IoError(format!("Write db: {}", e))),
        None => Ok(()),
    }
}

/// Find an entity by numeric id or uuid.
pub fn find_entity<S: AttributeStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Entity, AttestaError> {
    let key = key.trim();
    if let Ok(id) = key.parse::<u64>() {
        return Entity::load(store, EntityId(id));
    }
    let uuid = Uuid::parse_str(key)
        .map_err(|_| AttestaError::InvalidValue(format!("'{}' is neither an id nor a uuid", key)))?;
    Entity::by_uuid(store, uuid)?
        .ok_or_else(|| AttestaError::InvalidValue(format!("No entity with uuid {}", uuid)))
}

fn parse_kind(name: &str) -> Result<EntityKind, AttestaError> {
    EntityKind::from_name(name.trim()).ok_or_else(|| AttestaError::UnknownEntityKind(name.to_string()))
}

fn field_accessor<S: AttributeStore + ?Sized>(
    store: &S,
    entity: &Entity,
    model: &str,
) -> Result<FieldAccessor, AttestaError> {
    Registry::global().field_for(store, entity.kind().name(), entity.id(), model)
}

fn single_field(accessor: FieldAccessor, command: &str) -> Result<ComplexField, AttestaError> {
    match accessor {
        FieldAccessor::Single(field) => Ok(field),
        FieldAccessor::List(list) => Err(AttestaError::InvalidValue(format!(
            "{} applies to single-valued fields; {} is a list",
            command,
            list.def().key()
        ))),
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn report_errors(errors: &ValidationErrors, json_mode: bool) -> AttestaError {
    if json_mode {
        print_json(&serde_json::json!({ "valid": false, "errors": errors_to_json(errors) }));
    } else {
        println!("Validation failed:");
        for (key, error) in errors {
            println!("  {}: {}", key, error);
        }
    }
    AttestaError::InvalidValue(format!("{} field(s) failed validation", errors.len()))
}

fn meta(settings: &Settings, comment: &str) -> RevisionMeta {
    RevisionMeta::new(settings.editor.clone(), comment)
}

fn describe(value: &Option<FieldValue>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "(empty)".to_string(),
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), AttestaError> {
    let path = &settings.database;
    if path.exists() {
        if !force {
            return Err(AttestaError::IoError(format!(
                "Database {:?} already exists. Use --force to overwrite.",
                path
            )));
        }
        std::fs::remove_file(path)
            .map_err(|e| AttestaError::IoError(format!("Remove db: {}", e)))?;
    }

    let store = match settings.backend {
        BackendKind::Redb => StorageBackend::open_redb(path)?,
        BackendKind::File => StorageBackend::default(),
    };
    save_store(&store, path)?;

    println!("Initialized empty {} database at {:?}", settings.backend, path);
    Ok(())
}

// =============================================================================
// SOURCE COMMAND
// =============================================================================

/// Register a source.
pub fn cmd_source(
    settings: &Settings,
    json_mode: bool,
    title: String,
    publication: Option<String>,
    url: Option<String>,
    access_point: Option<String>,
) -> Result<(), AttestaError> {
    let mut store = open_store(settings)?;
    let source = store.insert_source(SourceDraft {
        title,
        publication,
        url,
        access_point,
    })?;
    save_store(&store, &settings.database)?;

    if json_mode {
        print_json(&serde_json::json!(source));
    } else {
        println!("Source {}: {}", source.id, source.title);
    }
    Ok(())
}

// =============================================================================
// VALIDATE / CREATE / UPDATE COMMANDS
// =============================================================================

/// Validate a mapping file against a type or an existing entity.
pub fn cmd_validate(
    settings: &Settings,
    json_mode: bool,
    kind: Option<&str>,
    entity: Option<&str>,
    file: &Path,
) -> Result<(), AttestaError> {
    let map = read_mapping(file)?;
    let store = open_store(settings)?;

    let (errors, validated) = match entity {
        Some(key) => find_entity(&store, key)?.validate(&store, &map)?,
        None => {
            let name = kind.ok_or_else(|| {
                AttestaError::InvalidValue("either --kind or --entity is required".to_string())
            })?;
            Entity::validate_new(&store, parse_kind(name)?, &map)?
        }
    };

    if !errors.is_empty() {
        return Err(report_errors(&errors, json_mode));
    }
    if json_mode {
        let keys: Vec<&String> = validated.keys().collect();
        print_json(&serde_json::json!({ "valid": true, "fields": keys }));
    } else {
        println!("Valid: {} field(s)", validated.len());
    }
    Ok(())
}

/// Create an entity from a mapping file.
pub fn cmd_create(
    settings: &Settings,
    json_mode: bool,
    kind: &str,
    file: &Path,
    comment: &str,
) -> Result<(), AttestaError> {
    let kind = parse_kind(kind)?;
    let map = read_mapping(file)?;
    let mut store = open_store(settings)?;

    let (errors, validated) = Entity::validate_new(&store, kind, &map)?;
    if !errors.is_empty() {
        return Err(report_errors(&errors, json_mode));
    }
    let entity = Entity::create(
        &mut store,
        kind,
        &validated,
        &settings.language,
        meta(settings, comment),
    )?;
    save_store(&store, &settings.database)?;

    if json_mode {
        print_json(&serde_json::json!({
            "id": entity.id().0,
            "uuid": entity.uuid().to_string(),
            "kind": kind.name(),
        }));
    } else {
        println!("Created {} {} ({})", kind, entity.id(), entity.uuid());
    }
    Ok(())
}

/// Apply a mapping file to an existing entity.
pub fn cmd_update(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    file: &Path,
    comment: &str,
) -> Result<(), AttestaError> {
    let map = read_mapping(file)?;
    let mut store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;

    let (errors, validated) = entity.validate(&store, &map)?;
    if !errors.is_empty() {
        return Err(report_errors(&errors, json_mode));
    }
    let report = entity.update(
        &mut store,
        &validated,
        &settings.language,
        meta(settings, comment),
    )?;
    save_store(&store, &settings.database)?;

    if json_mode {
        print_json(&serde_json::json!({
            "id": entity.id().0,
            "revision": report.revision.map(|r| r.0),
            "changed": report.changed,
        }));
    } else if report.changed.is_empty() {
        println!("No changes");
    } else {
        match report.revision {
            Some(revision) => println!("Revision {}", revision),
            None => println!("Updated without a new revision"),
        }
        for key in &report.changed {
            println!("  changed {}", key);
        }
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show an entity's current values in the configured language.
pub fn cmd_show(settings: &Settings, json_mode: bool, entity: &str) -> Result<(), AttestaError> {
    let store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;
    let lang = &settings.language;

    let values = entity.values(&store, lang)?;
    let title = entity.title(&store, lang)?;
    let complete = entity.is_complete(&store, lang)?;
    let mut sources = Vec::new();
    for id in entity.sources(&store, lang)? {
        if let Some(source) = store.get_source(id)? {
            sources.push(source);
        }
    }

    if json_mode {
        let fields: serde_json::Map<String, serde_json::Value> = values
            .iter()
            .map(|(def, values)| {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                (def.key(), serde_json::json!(rendered))
            })
            .collect();
        print_json(&serde_json::json!({
            "id": entity.id().0,
            "uuid": entity.uuid().to_string(),
            "kind": entity.kind().name(),
            "published": entity.is_published(),
            "complete": complete,
            "title": title.map(|t| t.to_string()),
            "fields": fields,
            "sources": sources,
        }));
        return Ok(());
    }

    println!(
        "{} {} - {}",
        entity.kind(),
        entity.id(),
        describe(&title)
    );
    println!("UUID:      {}", entity.uuid());
    println!("Published: {}", entity.is_published());
    println!("Complete:  {}", complete);
    println!("Language:  {}", lang);
    println!();
    for (def, values) in &values {
        let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
        println!("  {:<24} {}", def.label, rendered.join(", "));
    }
    if !sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &sources {
            println!("  [{}] {}", source.id, source.title);
        }
    }
    Ok(())
}

// =============================================================================
// HISTORY COMMANDS
// =============================================================================

/// Show the version history of one field.
pub fn cmd_history(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    field: &str,
) -> Result<(), AttestaError> {
    let store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;
    let lang = &settings.language;

    let members = match field_accessor(&store, &entity, field)? {
        FieldAccessor::Single(field) => vec![field],
        FieldAccessor::List(list) => list.get_list(&store, lang)?,
    };

    let mut entries = Vec::new();
    for member in &members {
        entries.extend(member.get_history(&store, lang)?);
    }
    entries.sort_by_key(|(version, _)| version.id);

    if json_mode {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|(version, revision)| {
                serde_json::json!({
                    "version": version.id.0,
                    "record": version.record.0,
                    "revision": revision.id.0,
                    "timestamp": revision.created_at.to_rfc3339(),
                    "editor": revision.editor,
                    "comment": revision.comment,
                    "state": version.state,
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(rows));
        return Ok(());
    }

    if entries.is_empty() {
        println!("No history for {}", field);
    }
    for (version, revision) in &entries {
        let sources: Vec<String> = version.state.sources.iter().map(ToString::to_string).collect();
        println!(
            "v{} (revision {}, {}, {}) {} [sources: {}] [confidence: {:?}]",
            version.id,
            revision.id,
            revision.created_at.format("%Y-%m-%d %H:%M:%S"),
            revision.editor.as_deref().unwrap_or("-"),
            describe(&version.state.value),
            sources.join(","),
            version.state.confidence,
        );
    }
    Ok(())
}

/// Show an entity's revisions, optionally with consecutive differences.
pub fn cmd_revisions(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    diff: bool,
) -> Result<(), AttestaError> {
    let store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;
    let revisions = get_revisions(&store, entity.id())?.collect::<Result<Vec<_>, _>>()?;

    if diff {
        let differences = get_differences(&revisions);
        if json_mode {
            print_json(&serde_json::json!(differences));
            return Ok(());
        }
        for difference in &differences {
            println!(
                "revision {} -> {} ({}, {})",
                difference.from,
                difference.to,
                difference.editor.as_deref().unwrap_or("-"),
                difference.comment
            );
            for (key, value) in &difference.added {
                println!("  + {}: {}", key, value);
            }
            for (key, value) in &difference.removed {
                println!("  - {}: {}", key, value);
            }
            for (key, (before, after)) in &difference.changed {
                println!("  ~ {}: {} -> {}", key, before, after);
            }
        }
        return Ok(());
    }

    if json_mode {
        let rows: Vec<serde_json::Value> = revisions
            .iter()
            .map(|(state, revision)| serde_json::json!({ "revision": revision, "state": state }))
            .collect();
        print_json(&serde_json::Value::Array(rows));
        return Ok(());
    }
    for (state, revision) in &revisions {
        println!(
            "revision {} ({}, {}) {}",
            revision.id,
            revision.created_at.format("%Y-%m-%d %H:%M:%S"),
            revision.editor.as_deref().unwrap_or("-"),
            revision.comment
        );
        for (key, value) in state {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}

// =============================================================================
// REVERT COMMANDS
// =============================================================================

/// Restore a field (or list member) to a recorded version.
pub fn cmd_revert(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    field: &str,
    version: u64,
    comment: &str,
) -> Result<(), AttestaError> {
    let mut store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;
    let version = VersionId(version);

    let target = match field_accessor(&store, &entity, field)? {
        FieldAccessor::Single(field) => field,
        FieldAccessor::List(list) => {
            let entry = store
                .get_version(version)?
                .ok_or(AttestaError::VersionNotFound(version))?;
            list.get_complex_field(entry.record)
        }
    };

    let mut scope = RevisionScope::new(meta(settings, comment));
    let record = target.revert(&mut store, &mut scope, version)?;
    save_store(&store, &settings.database)?;

    if json_mode {
        print_json(&serde_json::json!({ "record": record, "revision": scope.revision().map(|r| r.0) }));
    } else {
        println!(
            "Reverted {} to version {}: {}",
            target.def().key(),
            version,
            describe(&record.value)
        );
    }
    Ok(())
}

/// Restore a field to the value supported by exactly the given sources.
pub fn cmd_revert_source(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    field: &str,
    sources: &str,
    comment: &str,
) -> Result<(), AttestaError> {
    let sources = parse_source_ids(sources)?;
    let mut store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;
    let target = single_field(field_accessor(&store, &entity, field)?, "revert-source")?;

    let mut scope = RevisionScope::new(meta(settings, comment));
    let restored = target.revert_to_source(&mut store, &mut scope, &settings.language, &sources)?;
    save_store(&store, &settings.database)?;

    match (restored, json_mode) {
        (Some(record), true) => print_json(&serde_json::json!({ "record": record })),
        (None, true) => print_json(&serde_json::json!({ "record": null })),
        (Some(record), false) => {
            println!("Reverted {}: {}", target.def().key(), describe(&record.value));
        }
        (None, false) => println!("No version of {} matches those sources", target.def().key()),
    }
    Ok(())
}

// =============================================================================
// TRANSLATE COMMAND
// =============================================================================

/// Add a language variant of a translated field.
pub fn cmd_translate(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    field: &str,
    to: &str,
    value: &str,
    comment: &str,
) -> Result<(), AttestaError> {
    let lang = Language::new(to)?;
    let mut store = open_store(settings)?;
    let entity = find_entity(&store, entity)?;
    let target = single_field(field_accessor(&store, &entity, field)?, "translate")?;

    let value = match coerce(&store, target.def(), &RawValue::from(value))? {
        Ok(Coerced::Single(Some(value))) => value,
        Ok(_) => {
            return Err(AttestaError::InvalidValue(
                "a translation needs a non-empty value".to_string(),
            ));
        }
        Err(error) => return Err(AttestaError::InvalidValue(error.to_string())),
    };

    let mut scope = RevisionScope::new(meta(settings, comment));
    let record = target.translate(&mut store, &mut scope, &lang, value)?;
    save_store(&store, &settings.database)?;

    if json_mode {
        print_json(&serde_json::json!({ "record": record }));
    } else {
        println!(
            "Translated {} into {}: {}",
            target.def().key(),
            lang,
            describe(&record.value)
        );
    }
    Ok(())
}

// =============================================================================
// PUBLISH COMMAND
// =============================================================================

/// Publish or unpublish an entity.
pub fn cmd_publish(
    settings: &Settings,
    json_mode: bool,
    entity: &str,
    published: bool,
) -> Result<(), AttestaError> {
    let mut store = open_store(settings)?;
    let mut entity = find_entity(&store, entity)?;
    entity.set_published(&mut store, published)?;
    save_store(&store, &settings.database)?;

    if json_mode {
        print_json(&serde_json::json!({ "id": entity.id().0, "published": entity.is_published() }));
    } else if published {
        println!("Published {} {}", entity.kind(), entity.id());
    } else {
        println!("Unpublished {} {}", entity.kind(), entity.id());
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show database status.
pub fn cmd_status(settings: &Settings, json_mode: bool) -> Result<(), AttestaError> {
    let store = open_store(settings)?;

    let mut counts = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        let rows = store.entities(Some(kind))?;
        let published = rows.iter().filter(|row| row.published).count();
        counts.push((kind, rows.len(), published));
    }

    if json_mode {
        let entities: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(kind, total, published)| {
                (
                    kind.name().to_string(),
                    serde_json::json!({ "total": total, "published": published }),
                )
            })
            .collect();
        print_json(&serde_json::json!({
            "database": settings.database.to_string_lossy(),
            "backend": settings.backend.to_string(),
            "language": settings.language.as_str(),
            "entities": entities,
        }));
        return Ok(());
    }

    println!("Attesta Status");
    println!("==============");
    println!("Database: {:?}", settings.database);
    println!("Backend:  {}", settings.backend);
    println!("Language: {}", settings.language);
    println!();
    for (kind, total, published) in &counts {
        println!("{:<14} {:>6} ({} published)", kind.name(), total, published);
    }
    Ok(())
}

//! Tests for configuration discovery and priority resolution.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use attesta::config::{DEFAULT_CONFIG_FILE, DEFAULT_DATABASE};
use attesta::{BackendKind, FileConfig, Overrides, Settings};
use std::path::PathBuf;
use tempfile::tempdir;

// =============================================================================
// FILE CONFIG PARSING
// =============================================================================

#[test]
fn test_parse_full_config() {
    let config = FileConfig::parse(
        r#"
database = "/var/lib/attesta/main.redb"
backend = "file"
language = "fr"
editor = "ana"
"#,
    )
    .unwrap();

    assert_eq!(config.database, Some(PathBuf::from("/var/lib/attesta/main.redb")));
    assert_eq!(config.backend.as_deref(), Some("file"));
    assert_eq!(config.language.as_deref(), Some("fr"));
    assert_eq!(config.editor.as_deref(), Some("ana"));
}

#[test]
fn test_parse_empty_config() {
    assert_eq!(FileConfig::parse("").unwrap(), FileConfig::default());
}

#[test]
fn test_unknown_key_rejected() {
    assert!(FileConfig::parse("databse = \"typo.redb\"").is_err());
}

#[test]
fn test_invalid_toml_rejected() {
    assert!(FileConfig::parse("database = ").is_err());
}

// =============================================================================
// PRIORITY
// =============================================================================

#[test]
fn test_defaults_when_nothing_configured() {
    let settings = Settings::merge(&Overrides::default(), FileConfig::default()).unwrap();

    assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
    assert_eq!(settings.backend, BackendKind::Redb);
    assert_eq!(settings.language.as_str(), "en");
    assert_eq!(settings.editor, None);
}

#[test]
fn test_file_overrides_defaults() {
    let file = FileConfig {
        database: Some(PathBuf::from("from-file.bin")),
        backend: Some("file".to_string()),
        language: Some("es".to_string()),
        editor: Some("ben".to_string()),
    };
    let settings = Settings::merge(&Overrides::default(), file).unwrap();

    assert_eq!(settings.database, PathBuf::from("from-file.bin"));
    assert_eq!(settings.backend, BackendKind::File);
    assert_eq!(settings.language.as_str(), "es");
    assert_eq!(settings.editor.as_deref(), Some("ben"));
}

#[test]
fn test_overrides_beat_file() {
    let file = FileConfig {
        database: Some(PathBuf::from("from-file.bin")),
        backend: Some("file".to_string()),
        language: Some("es".to_string()),
        editor: Some("ben".to_string()),
    };
    let overrides = Overrides {
        database: Some(PathBuf::from("from-flag.redb")),
        backend: Some("REDB".to_string()),
        language: Some("FR".to_string()),
        ..Overrides::default()
    };
    let settings = Settings::merge(&overrides, file).unwrap();

    assert_eq!(settings.database, PathBuf::from("from-flag.redb"));
    assert_eq!(settings.backend, BackendKind::Redb);
    assert_eq!(settings.language.as_str(), "fr");
    // Not overridden, so the file value stands.
    assert_eq!(settings.editor.as_deref(), Some("ben"));
}

#[test]
fn test_blank_editor_is_none() {
    let overrides = Overrides {
        editor: Some("   ".to_string()),
        ..Overrides::default()
    };
    let settings = Settings::merge(&overrides, FileConfig::default()).unwrap();
    assert_eq!(settings.editor, None);
}

#[test]
fn test_invalid_values_rejected() {
    let bad_backend = Overrides {
        backend: Some("sqlite".to_string()),
        ..Overrides::default()
    };
    assert!(Settings::merge(&bad_backend, FileConfig::default()).is_err());

    let bad_language = Overrides {
        language: Some("not a tag".to_string()),
        ..Overrides::default()
    };
    assert!(Settings::merge(&bad_language, FileConfig::default()).is_err());
}

// =============================================================================
// DISCOVERY
// =============================================================================

#[test]
fn test_discover_default_file_in_dir() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "backend = \"file\"\n").unwrap();

    let settings = Settings::resolve(&Overrides::default(), dir.path()).unwrap();
    assert_eq!(settings.backend, BackendKind::File);
}

#[test]
fn test_discover_without_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let config = FileConfig::discover(None, dir.path()).unwrap();
    assert_eq!(config, FileConfig::default());
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    assert!(FileConfig::discover(Some(&missing), dir.path()).is_err());
}

#[test]
fn test_explicit_config_wins_over_default_file() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "language = \"es\"\n").unwrap();
    let explicit = dir.path().join("custom.toml");
    std::fs::write(&explicit, "language = \"fr\"\n").unwrap();

    let overrides = Overrides {
        config: Some(explicit),
        ..Overrides::default()
    };
    let settings = Settings::resolve(&overrides, dir.path()).unwrap();
    assert_eq!(settings.language.as_str(), "fr");
}

#[test]
fn test_backend_display() {
    assert_eq!(BackendKind::Redb.to_string(), "redb");
    assert_eq!(BackendKind::File.to_string(), "file");
    assert_eq!(BackendKind::from_name(" File ").unwrap(), BackendKind::File);
}

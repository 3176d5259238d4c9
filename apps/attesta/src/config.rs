//! # Configuration
//!
//! Resolves the settings every command runs with.
//!
//! Priority, highest first:
//!
//! 1. command-line flag
//! 2. environment variable (`ATTESTA_DATABASE`, `ATTESTA_BACKEND`,
//!    `ATTESTA_LANGUAGE`, `ATTESTA_EDITOR`)
//! 3. TOML file (`--config` / `ATTESTA_CONFIG`, else `./attesta.toml`)
//! 4. compiled default
//!
//! Flags and environment variables are merged by clap before they reach
//! this module, so `Overrides` already holds the winner of the first two.

use attesta_core::{AttestaError, Language};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "attesta.toml";

/// Database path used when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "attesta.redb";

/// Largest config file accepted (64 KB).
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

// =============================================================================
// BACKEND KIND
// =============================================================================

/// Which storage backend a database path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// ACID database file managed by redb.
    #[default]
    Redb,
    /// Binary snapshot of an in-memory store, rewritten after each change.
    File,
}

impl BackendKind {
    pub fn from_name(name: &str) -> Result<Self, AttestaError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(BackendKind::Redb),
            "file" => Ok(BackendKind::File),
            other => Err(AttestaError::InvalidValue(format!(
                "unknown backend '{}' (expected 'redb' or 'file')",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Redb => f.write_str("redb"),
            BackendKind::File => f.write_str("file"),
        }
    }
}

// =============================================================================
// FILE CONFIG
// =============================================================================

/// Contents of `attesta.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub backend: Option<String>,
    pub language: Option<String>,
    pub editor: Option<String>,
}

impl FileConfig {
    /// Parse TOML text.
    pub fn parse(text: &str) -> Result<Self, AttestaError> {
        toml::from_str(text)
            .map_err(|e| AttestaError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, AttestaError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            AttestaError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(AttestaError::SerializationError(format!(
                "Config file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            AttestaError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Load the explicitly named file (which must exist), or the default
    /// file in `dir` if present, or nothing.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, AttestaError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = dir.join(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            Self::load(&fallback)
        } else {
            Ok(Self::default())
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub backend: Option<String>,
    pub language: Option<String>,
    pub editor: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: BackendKind,
    /// Language writes go to and reads are made in.
    pub language: Language,
    /// Recorded on every revision the command creates.
    pub editor: Option<String>,
}

impl Settings {
    /// Merge overrides over a config file over the defaults.
    pub fn merge(overrides: &Overrides, file: FileConfig) -> Result<Self, AttestaError> {
        let database = overrides
            .database
            .clone()
            .or(file.database)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        let backend = match overrides.backend.as_deref().or(file.backend.as_deref()) {
            Some(name) => BackendKind::from_name(name)?,
            None => BackendKind::default(),
        };
        let language = match overrides.language.as_deref().or(file.language.as_deref()) {
            Some(tag) => Language::new(tag)?,
            None => Language::fallback(),
        };
        let editor = overrides
            .editor
            .clone()
            .or(file.editor)
            .filter(|e| !e.trim().is_empty());

        Ok(Self {
            database,
            backend,
            language,
            editor,
        })
    }

    /// Discover the config file relative to `dir` and merge.
    pub fn resolve(overrides: &Overrides, dir: &Path) -> Result<Self, AttestaError> {
        let file = FileConfig::discover(overrides.config.as_deref(), dir)?;
        Self::merge(overrides, file)
    }
}

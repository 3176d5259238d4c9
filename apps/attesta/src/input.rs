//! # Mapping Files
//!
//! Reads the JSON field maps fed to `validate`, `create` and `update`.
//!
//! Keys are qualified field keys. Values are either a bare value or an
//! object carrying provenance:
//!
//! ```json
//! {
//!   "Organization_OrganizationName": {"value": "Acme", "confidence": 3, "sources": [1]},
//!   "Organization_OrganizationAlias": {"value": ["ACME", "AC"], "confidence": 2, "sources": [1]},
//!   "Organization_OrganizationRealFounding": true
//! }
//! ```

use attesta_core::{AttestaError, FieldInput, FieldMap, RawValue, SourceId, ValidationErrors};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Largest mapping file accepted (10 MB).
pub const MAX_MAPPING_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Bare(RawValue),
    Full(FieldInput),
}

impl From<Entry> for FieldInput {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Bare(value) => FieldInput::new(value),
            Entry::Full(input) => input,
        }
    }
}

/// Parse a JSON mapping.
pub fn parse_mapping(text: &str) -> Result<FieldMap, AttestaError> {
    let entries: BTreeMap<String, Entry> = serde_json::from_str(text)
        .map_err(|e| AttestaError::SerializationError(format!("Invalid mapping: {}", e)))?;
    Ok(entries
        .into_iter()
        .map(|(key, entry)| (key, FieldInput::from(entry)))
        .collect())
}

/// Read and parse a JSON mapping file.
pub fn read_mapping(path: &Path) -> Result<FieldMap, AttestaError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        AttestaError::IoError(format!("Cannot read mapping '{}': {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(AttestaError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_MAPPING_FILE_SIZE {
        return Err(AttestaError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_MAPPING_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        AttestaError::IoError(format!("Cannot read mapping '{}': {}", path.display(), e))
    })?;
    parse_mapping(&text)
}

/// Parse a comma-separated list of source ids (`"1, 4,7"`).
pub fn parse_source_ids(text: &str) -> Result<BTreeSet<SourceId>, AttestaError> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map(SourceId)
                .map_err(|_| AttestaError::InvalidValue(format!("invalid source id '{}'", part)))
        })
        .collect()
}

/// Validation errors as a JSON object of key to message.
pub fn errors_to_json(errors: &ValidationErrors) -> serde_json::Value {
    errors
        .iter()
        .map(|(key, error)| (key.clone(), serde_json::Value::String(error.to_string())))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

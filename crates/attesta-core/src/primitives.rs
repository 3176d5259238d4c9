//! # Primitives
//!
//! Hardcoded constants for the attribute store.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Language translated fields fall back to when a variant is missing.
pub const FALLBACK_LANGUAGE: &str = "en";

/// Separator between the entity type name and the field model name in a
/// qualified key (`Organization_OrganizationName`).
pub const KEY_SEPARATOR: char = '_';

/// Numeric confidence levels as posted by forms and import scripts.
/// Zero means "unset".
pub const CONFIDENCE_LOW: i64 = 1;
pub const CONFIDENCE_MEDIUM: i64 = 2;
pub const CONFIDENCE_HIGH: i64 = 3;

/// Geometry coordinates are stored as degrees multiplied by this factor.
///
/// Seven decimal places is roughly one centimetre at the equator.
pub const GEO_SCALE: i64 = 10_000_000;

/// Number of fractional digits `GEO_SCALE` represents.
pub const GEO_DECIMALS: usize = 7;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Shortest accepted language tag (`en`).
pub const MIN_LANGUAGE_LENGTH: usize = 2;

/// Longest accepted language tag (`zh-hant`).
pub const MAX_LANGUAGE_LENGTH: usize = 7;

/// Maximum length for text values (64KB).
///
/// Longer values are rejected during validation.
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Maximum number of members posted for a single list field.
pub const MAX_LIST_MEMBERS: usize = 1000;

// =============================================================================
// SNAPSHOT FILE FORMAT
// =============================================================================

/// Magic bytes for the binary snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"ATTS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

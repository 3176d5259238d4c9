//! # Value Coercion
//!
//! Converts raw posted input into typed `FieldValue`s, with one routine per
//! `ValueKind` variant:
//!
//! | Kind         | Accepted input                                        |
//! |--------------|-------------------------------------------------------|
//! | `Text`       | any string (trimmed), integers                        |
//! | `Bool`       | booleans, `0`/`1`, `true`/`on`/`yes`, `false`/`off`/`no` |
//! | `Date`       | `YYYY`, `YYYY-MM`, `YYYY-MM-DD`                       |
//! | `ForeignRef` | an entity id (integer or digit string) of the target kind |
//! | `Geometry`   | `"lon,lat"` or `POINT(lon lat)`                       |
//!
//! Coercion failures are returned as `FieldError::InvalidValue` so they can
//! be shown next to the field. Only storage failures (while resolving a
//! foreign reference) surface as `AttestaError`.

use crate::policy::{FieldDef, ValueKind};
use crate::primitives::{GEO_DECIMALS, GEO_SCALE, MAX_LIST_MEMBERS, MAX_TEXT_LENGTH};
use crate::store::AttributeStore;
use crate::types::{
    ApproximateDate, AttestaError, EntityId, EntityKind, FieldError, FieldValue, GeoPoint,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Untyped input as posted by a form or an import script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<RawValue>),
}

impl RawValue {
    /// Null, blank text and empty lists count as "no value". `false` does not.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(text) => text.trim().is_empty(),
            RawValue::List(items) => items.iter().all(RawValue::is_empty),
            RawValue::Bool(_) | RawValue::Int(_) => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_string())
    }
}

impl From<String> for RawValue {
    fn from(text: String) -> Self {
        RawValue::Text(text)
    }
}

impl From<bool> for RawValue {
    fn from(flag: bool) -> Self {
        RawValue::Bool(flag)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Int(n)
    }
}

/// A coerced value, shaped by the field's multiplicity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coerced {
    Single(Option<FieldValue>),
    /// Distinct members, sorted by value.
    List(Vec<FieldValue>),
}

impl Coerced {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Coerced::Single(value) => value.is_none(),
            Coerced::List(values) => values.is_empty(),
        }
    }
}

/// Coerce `raw` into the storage type of `def`.
///
/// The outer `Result` carries storage failures; the inner one carries the
/// per-field validation outcome.
pub fn coerce<S: AttributeStore + ?Sized>(
    store: &S,
    def: &FieldDef,
    raw: &RawValue,
) -> Result<Result<Coerced, FieldError>, AttestaError> {
    if def.is_list() {
        let items: &[RawValue] = match raw {
            RawValue::List(items) => items,
            RawValue::Null => &[],
            other => std::slice::from_ref(other),
        };
        if items.len() > MAX_LIST_MEMBERS {
            return Ok(Err(FieldError::InvalidValue(format!(
                "Ensure this list has at most {} members",
                MAX_LIST_MEMBERS
            ))));
        }

        let mut values = BTreeSet::new();
        for item in items {
            match coerce_scalar(store, def.kind, item)? {
                Ok(Some(value)) => {
                    values.insert(value);
                }
                Ok(None) => {}
                Err(reason) => return Ok(Err(FieldError::InvalidValue(reason))),
            }
        }
        return Ok(Ok(Coerced::List(values.into_iter().collect())));
    }

    if matches!(raw, RawValue::List(_)) {
        return Ok(Err(FieldError::InvalidValue(
            "Expected a single value".to_string(),
        )));
    }
    Ok(coerce_scalar(store, def.kind, raw)?
        .map(Coerced::Single)
        .map_err(FieldError::InvalidValue))
}

/// Dispatch on the value kind. `Ok(None)` means the input was empty.
fn coerce_scalar<S: AttributeStore + ?Sized>(
    store: &S,
    kind: ValueKind,
    raw: &RawValue,
) -> Result<Result<Option<FieldValue>, String>, AttestaError> {
    if raw.is_empty() {
        return Ok(Ok(None));
    }
    let value = match kind {
        ValueKind::Text => coerce_text(raw),
        ValueKind::Bool => coerce_bool(raw),
        ValueKind::Date => coerce_date(raw),
        ValueKind::Geometry => coerce_geometry(raw),
        ValueKind::ForeignRef(target) => return coerce_ref(store, target, raw),
    };
    Ok(value.map(Some))
}

fn coerce_text(raw: &RawValue) -> Result<FieldValue, String> {
    let text = match raw {
        RawValue::Text(text) => text.trim().to_string(),
        RawValue::Int(n) => n.to_string(),
        RawValue::Bool(flag) => flag.to_string(),
        RawValue::Null | RawValue::List(_) => return Err("Enter a valid text value".to_string()),
    };
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(format!(
            "Ensure this value has at most {} characters",
            MAX_TEXT_LENGTH
        ));
    }
    Ok(FieldValue::Text(text))
}

fn coerce_bool(raw: &RawValue) -> Result<FieldValue, String> {
    let flag = match raw {
        RawValue::Bool(flag) => Some(*flag),
        RawValue::Int(1) => Some(true),
        RawValue::Int(0) => Some(false),
        RawValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "on" | "yes" | "1" => Some(true),
            "false" | "f" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    flag.map(FieldValue::Bool)
        .ok_or_else(|| "Value must be either True or False".to_string())
}

fn coerce_date(raw: &RawValue) -> Result<FieldValue, String> {
    let parsed = match raw {
        RawValue::Text(text) => parse_date(text.trim()),
        RawValue::Int(year) => i32::try_from(*year)
            .ok()
            .and_then(|year| ApproximateDate::new(year, None, None)),
        _ => None,
    };
    parsed
        .map(FieldValue::Date)
        .ok_or_else(|| "Enter a valid date (YYYY, YYYY-MM or YYYY-MM-DD)".to_string())
}

/// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Option<ApproximateDate> {
    fn component(part: &str, max_len: usize) -> Option<u32> {
        if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    }

    let mut parts = text.split('-');
    let year = component(parts.next()?, 4)?;
    let month = match parts.next() {
        Some(part) => Some(component(part, 2)?),
        None => None,
    };
    let day = match parts.next() {
        Some(part) => Some(component(part, 2)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    ApproximateDate::new(i32::try_from(year).ok()?, month, day)
}

fn coerce_geometry(raw: &RawValue) -> Result<FieldValue, String> {
    let RawValue::Text(text) = raw else {
        return Err("Enter a point as \"lon,lat\" or POINT(lon lat)".to_string());
    };
    parse_point(text)
        .map(FieldValue::Geometry)
        .ok_or_else(|| format!("Invalid point: {}", text.trim()))
}

/// Parse `"lon,lat"` or `POINT(lon lat)` into a fixed-point `GeoPoint`.
pub fn parse_point(text: &str) -> Option<GeoPoint> {
    let text = text.trim();
    let is_wkt = text
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("point"));

    let (lon, lat) = if is_wkt {
        let inner = text.get(5..)?.trim().strip_prefix('(')?.strip_suffix(')')?;
        let mut coords = inner.split_whitespace();
        let pair = (coords.next()?, coords.next()?);
        if coords.next().is_some() {
            return None;
        }
        pair
    } else {
        text.split_once(',')?
    };

    GeoPoint::new(parse_degrees(lon)?, parse_degrees(lat)?)
}

/// Parse a decimal degree string into degrees scaled by `GEO_SCALE`.
///
/// Fractional digits beyond `GEO_DECIMALS` are truncated.
fn parse_degrees(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: String = frac
        .chars()
        .chain(std::iter::repeat('0'))
        .take(GEO_DECIMALS)
        .collect();
    let scaled = whole.checked_mul(GEO_SCALE)?.checked_add(frac.parse().ok()?)?;
    Some(if negative { -scaled } else { scaled })
}

fn coerce_ref<S: AttributeStore + ?Sized>(
    store: &S,
    target: EntityKind,
    raw: &RawValue,
) -> Result<Result<Option<FieldValue>, String>, AttestaError> {
    let id = match raw {
        RawValue::Int(n) => u64::try_from(*n).ok(),
        RawValue::Text(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    let Some(id) = id.map(EntityId) else {
        return Ok(Err(format!("Expected the id of a {}", target)));
    };
    if !store.entity_exists(target, id)? {
        return Ok(Err(format!(
            "Select a valid choice. {} {} does not exist",
            target, id
        )));
    }
    Ok(Ok(Some(FieldValue::Ref(id))))
}

// =============================================================================
// TESTS
// =============================================================================

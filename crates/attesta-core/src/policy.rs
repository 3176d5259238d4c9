//! # Field Policy
//!
//! Static metadata attached to every complex field definition.
//!
//! A field's capabilities are a small data-driven set read by the generic
//! accessors in `field` and `list`:
//!
//! ```text
//! FieldPolicy::new().translated().versioned().sourced()
//! ```
//!
//! Policies are fixed at definition time and never change at runtime.

use crate::primitives::KEY_SEPARATOR;
use crate::types::EntityKind;

/// Whether a field demands evidentiary sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sourcing {
    /// Values are never sourced; supplied sources are discarded.
    None,
    /// Sources and confidence are stored when supplied but not enforced.
    Optional,
    /// A non-empty value must cite at least one source.
    Required,
}

/// Capability flags of a complex field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    pub sourcing: Sourcing,
    /// Writes are snapshotted into the version store.
    pub versioned: bool,
    /// The value varies per language, with a fallback language.
    pub translated: bool,
}

impl FieldPolicy {
    /// A plain field: unsourced, unversioned, untranslated.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sourcing: Sourcing::None,
            versioned: false,
            translated: false,
        }
    }

    #[must_use]
    pub const fn translated(self) -> Self {
        Self {
            translated: true,
            ..self
        }
    }

    #[must_use]
    pub const fn versioned(self) -> Self {
        Self {
            versioned: true,
            ..self
        }
    }

    #[must_use]
    pub const fn sourced(self) -> Self {
        Self {
            sourcing: Sourcing::Required,
            ..self
        }
    }

    #[must_use]
    pub const fn sourced_optional(self) -> Self {
        Self {
            sourcing: Sourcing::Optional,
            ..self
        }
    }

    /// Whether sources and confidence are kept at all.
    #[must_use]
    pub const fn is_sourced(&self) -> bool {
        !matches!(self.sourcing, Sourcing::None)
    }

    #[must_use]
    pub const fn requires_source(&self) -> bool {
        matches!(self.sourcing, Sourcing::Required)
    }
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage type of a field's value. Selects the coercion routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Date,
    Bool,
    /// Reference to another entity of the given kind.
    ForeignRef(EntityKind),
    Geometry,
}

/// Whether a field holds one value or a set of concurrently valid values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    List,
}

/// Static definition of one complex field on one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub entity: EntityKind,
    /// Model name, e.g. `OrganizationName`. Also the record's `field` column.
    pub model: &'static str,
    /// Short accessor name, e.g. `name`.
    pub attr: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    pub kind: ValueKind,
    pub multiplicity: Multiplicity,
    pub policy: FieldPolicy,
}

impl FieldDef {
    /// Define a single-valued field.
    #[must_use]
    pub const fn single(
        entity: EntityKind,
        model: &'static str,
        attr: &'static str,
        label: &'static str,
        kind: ValueKind,
        policy: FieldPolicy,
    ) -> Self {
        Self {
            entity,
            model,
            attr,
            label,
            kind,
            multiplicity: Multiplicity::Single,
            policy,
        }
    }

    /// Define a list field.
    #[must_use]
    pub const fn list(
        entity: EntityKind,
        model: &'static str,
        attr: &'static str,
        label: &'static str,
        kind: ValueKind,
        policy: FieldPolicy,
    ) -> Self {
        Self {
            entity,
            model,
            attr,
            label,
            kind,
            multiplicity: Multiplicity::List,
            policy,
        }
    }

    /// The qualified key forms and import scripts address this field by.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{}{}", self.entity.name(), KEY_SEPARATOR, self.model)
    }

    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self.multiplicity, Multiplicity::List)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_stacks_flags() {
        let policy = FieldPolicy::new().translated().versioned().sourced();
        assert!(policy.translated);
        assert!(policy.versioned);
        assert!(policy.requires_source());

        let optional = FieldPolicy::new().versioned().sourced_optional();
        assert!(optional.is_sourced());
        assert!(!optional.requires_source());
        assert!(!FieldPolicy::default().is_sourced());
    }

    #[test]
    fn qualified_key_format() {
        let def = FieldDef::single(
            EntityKind::Organization,
            "OrganizationName",
            "name",
            "Name",
            ValueKind::Text,
            FieldPolicy::new(),
        );
        assert_eq!(def.key(), "Organization_OrganizationName");
        assert!(!def.is_list());
    }
}

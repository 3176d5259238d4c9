//! # Entity Schemas
//!
//! The static field layout of every tracked entity type, and the registry
//! that resolves qualified keys (`"{Entity}_{FieldModel}"`) to field
//! definitions.
//!
//! ```text
//! Organization_OrganizationName
//! ^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^
//! entity type  field model
//! ```
//!
//! The registry is built once from the static tables below; nothing is
//! resolved by reflection at runtime.

use crate::field::ComplexField;
use crate::list::ComplexFieldList;
use crate::policy::{FieldDef, FieldPolicy, Multiplicity, ValueKind};
use crate::primitives::KEY_SEPARATOR;
use crate::store::AttributeStore;
use crate::types::{AttestaError, EntityId, EntityKind};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// The fixed field layout of one entity type.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Field definitions in declaration order.
    pub fields: &'static [FieldDef],
    /// Model names of the fields that must hold a value.
    pub required: &'static [&'static str],
    /// Model name of the field whose value represents the entity.
    pub title: &'static str,
}

impl EntitySchema {
    /// Look up a field by model name.
    #[must_use]
    pub fn field(&self, model: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|def| def.model == model)
    }

    /// Single-valued fields in declaration order.
    pub fn singles(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields
            .iter()
            .filter(|def| def.multiplicity == Multiplicity::Single)
    }

    /// List fields in declaration order.
    pub fn lists(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields
            .iter()
            .filter(|def| def.multiplicity == Multiplicity::List)
    }

    /// All fields in write order: singles first, then lists.
    pub fn write_order(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.singles().chain(self.lists())
    }

    #[must_use]
    pub fn is_required(&self, def: &FieldDef) -> bool {
        self.required.contains(&def.model)
    }

    /// Qualified keys of the required fields.
    #[must_use]
    pub fn required_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|def| self.is_required(def))
            .map(FieldDef::key)
            .collect()
    }

    /// The schema of an entity kind.
    #[must_use]
    pub fn of(kind: EntityKind) -> &'static EntitySchema {
        match kind {
            EntityKind::Organization => &ORGANIZATION,
            EntityKind::Person => &PERSON,
            EntityKind::Geosite => &GEOSITE,
            EntityKind::Emplacement => &EMPLACEMENT,
            EntityKind::Violation => &VIOLATION,
            EntityKind::Area => &AREA,
            EntityKind::MembershipPerson => &MEMBERSHIP_PERSON,
            EntityKind::MembershipOrganization => &MEMBERSHIP_ORGANIZATION,
            EntityKind::Composition => &COMPOSITION,
            EntityKind::Association => &ASSOCIATION,
        }
    }
}

// =============================================================================
// POLICIES
// =============================================================================

/// `@translated @versioned @sourced`
const TRANSLATED_SOURCED: FieldPolicy = FieldPolicy::new().translated().versioned().sourced();

/// `@versioned @sourced`
const SOURCED: FieldPolicy = FieldPolicy::new().versioned().sourced();

/// `@versioned @sourced_optional`
const SOURCED_OPTIONAL: FieldPolicy = FieldPolicy::new().versioned().sourced_optional();

/// `@translated @versioned`
const TRANSLATED: FieldPolicy = FieldPolicy::new().translated().versioned();

/// `@versioned`
const PLAIN: FieldPolicy = FieldPolicy::new().versioned();

// =============================================================================
// ORGANIZATION
// =============================================================================

const ORG: EntityKind = EntityKind::Organization;

static ORGANIZATION_FIELDS: [FieldDef; 7] = [
    FieldDef::single(ORG, "OrganizationName", "name", "Name", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::list(ORG, "OrganizationAlias", "alias", "Alias", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::list(
        ORG,
        "OrganizationClassification",
        "classification",
        "Classification",
        ValueKind::Text,
        SOURCED,
    ),
    FieldDef::single(
        ORG,
        "OrganizationFoundingDate",
        "foundingdate",
        "Date of founding",
        ValueKind::Date,
        SOURCED,
    ),
    FieldDef::single(
        ORG,
        "OrganizationDissolutionDate",
        "dissolutiondate",
        "Date of dissolution",
        ValueKind::Date,
        SOURCED,
    ),
    FieldDef::single(
        ORG,
        "OrganizationRealFounding",
        "realfounding",
        "Is the date of founding real?",
        ValueKind::Bool,
        SOURCED_OPTIONAL,
    ),
    FieldDef::single(
        ORG,
        "OrganizationRealDissolution",
        "realdissolution",
        "Is the date of dissolution real?",
        ValueKind::Bool,
        SOURCED_OPTIONAL,
    ),
];

pub static ORGANIZATION: EntitySchema = EntitySchema {
    kind: ORG,
    fields: &ORGANIZATION_FIELDS,
    required: &["OrganizationName"],
    title: "OrganizationName",
};

// =============================================================================
// PERSON
// =============================================================================

const PER: EntityKind = EntityKind::Person;

static PERSON_FIELDS: [FieldDef; 3] = [
    FieldDef::single(PER, "PersonName", "name", "Name", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::list(PER, "PersonAlias", "aliases", "Other names", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::single(PER, "PersonDivisionId", "division_id", "Country", ValueKind::Text, SOURCED),
];

pub static PERSON: EntitySchema = EntitySchema {
    kind: PER,
    fields: &PERSON_FIELDS,
    required: &["PersonName"],
    title: "PersonName",
};

// =============================================================================
// GEOSITE
// =============================================================================

const GEO: EntityKind = EntityKind::Geosite;

static GEOSITE_FIELDS: [FieldDef; 6] = [
    FieldDef::single(GEO, "GeositeName", "name", "Name", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::single(GEO, "GeositeAdminLevel1", "adminlevel1", "Admin level 1", ValueKind::Text, SOURCED),
    FieldDef::single(GEO, "GeositeAdminLevel2", "adminlevel2", "Admin level 2", ValueKind::Text, SOURCED),
    FieldDef::single(
        GEO,
        "GeositeCoordinates",
        "coordinates",
        "Coordinates",
        ValueKind::Geometry,
        SOURCED,
    ),
    FieldDef::single(GEO, "GeositeGeoname", "geoname", "GeoNames name", ValueKind::Text, SOURCED),
    FieldDef::single(GEO, "GeositeGeonameId", "geonameid", "GeoNames ID", ValueKind::Text, SOURCED),
];

pub static GEOSITE: EntitySchema = EntitySchema {
    kind: GEO,
    fields: &GEOSITE_FIELDS,
    required: &["GeositeName"],
    title: "GeositeName",
};

// =============================================================================
// EMPLACEMENT
// =============================================================================

const EMP: EntityKind = EntityKind::Emplacement;

static EMPLACEMENT_FIELDS: [FieldDef; 4] = [
    FieldDef::single(EMP, "EmplacementStartDate", "startdate", "Start date", ValueKind::Date, SOURCED),
    FieldDef::single(EMP, "EmplacementEndDate", "enddate", "End date", ValueKind::Date, SOURCED),
    FieldDef::single(
        EMP,
        "EmplacementOrganization",
        "organization",
        "Organization",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(
        EMP,
        "EmplacementSite",
        "site",
        "Site",
        ValueKind::ForeignRef(EntityKind::Geosite),
        SOURCED,
    ),
];

pub static EMPLACEMENT: EntitySchema = EntitySchema {
    kind: EMP,
    fields: &EMPLACEMENT_FIELDS,
    required: &["EmplacementOrganization", "EmplacementSite"],
    title: "EmplacementOrganization",
};

// =============================================================================
// VIOLATION
// =============================================================================

const VIO: EntityKind = EntityKind::Violation;

static VIOLATION_FIELDS: [FieldDef; 12] = [
    FieldDef::single(VIO, "ViolationStartDate", "startdate", "Start date", ValueKind::Date, PLAIN),
    FieldDef::single(VIO, "ViolationEndDate", "enddate", "End date", ValueKind::Date, PLAIN),
    FieldDef::single(
        VIO,
        "ViolationLocationDescription",
        "locationdescription",
        "Location description",
        ValueKind::Text,
        TRANSLATED,
    ),
    FieldDef::single(VIO, "ViolationAdminLevel1", "adminlevel1", "Admin level 1", ValueKind::Text, PLAIN),
    FieldDef::single(VIO, "ViolationAdminLevel2", "adminlevel2", "Admin level 2", ValueKind::Text, PLAIN),
    FieldDef::single(VIO, "ViolationGeoname", "geoname", "GeoNames name", ValueKind::Text, PLAIN),
    FieldDef::single(VIO, "ViolationGeonameId", "geonameid", "GeoNames ID", ValueKind::Text, PLAIN),
    FieldDef::single(VIO, "ViolationLocation", "location", "Location", ValueKind::Geometry, PLAIN),
    FieldDef::single(
        VIO,
        "ViolationDescription",
        "description",
        "Description",
        ValueKind::Text,
        TRANSLATED,
    ),
    FieldDef::single(
        VIO,
        "ViolationPerpetrator",
        "perpetrator",
        "Perpetrator",
        ValueKind::ForeignRef(EntityKind::Person),
        PLAIN,
    ),
    FieldDef::single(
        VIO,
        "ViolationPerpetratorOrganization",
        "perpetratororganization",
        "Perpetrator unit",
        ValueKind::ForeignRef(EntityKind::Organization),
        PLAIN,
    ),
    FieldDef::list(VIO, "ViolationType", "types", "Violation type", ValueKind::Text, PLAIN),
];

pub static VIOLATION: EntitySchema = EntitySchema {
    kind: VIO,
    fields: &VIOLATION_FIELDS,
    required: &["ViolationStartDate", "ViolationDescription"],
    title: "ViolationDescription",
};

// =============================================================================
// AREA
// =============================================================================

const ARE: EntityKind = EntityKind::Area;

static AREA_FIELDS: [FieldDef; 5] = [
    FieldDef::single(ARE, "AreaName", "name", "Name", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::single(ARE, "AreaCode", "code", "Classification", ValueKind::Text, SOURCED),
    FieldDef::single(ARE, "AreaOSMName", "osmname", "OSM name", ValueKind::Text, SOURCED),
    FieldDef::single(ARE, "AreaOSMId", "osmid", "OSM ID", ValueKind::Text, SOURCED),
    FieldDef::single(ARE, "AreaDivisionId", "division_id", "Division ID", ValueKind::Text, SOURCED),
];

pub static AREA: EntitySchema = EntitySchema {
    kind: ARE,
    fields: &AREA_FIELDS,
    required: &["AreaName"],
    title: "AreaName",
};

// =============================================================================
// RELATIONSHIPS
// =============================================================================

const MBP: EntityKind = EntityKind::MembershipPerson;

static MEMBERSHIP_PERSON_FIELDS: [FieldDef; 11] = [
    FieldDef::single(
        MBP,
        "MembershipPersonMember",
        "member",
        "Member",
        ValueKind::ForeignRef(EntityKind::Person),
        SOURCED,
    ),
    FieldDef::single(
        MBP,
        "MembershipPersonOrganization",
        "organization",
        "Organization",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(MBP, "MembershipPersonRole", "role", "Role", ValueKind::Text, SOURCED),
    FieldDef::single(MBP, "MembershipPersonTitle", "title", "Title", ValueKind::Text, TRANSLATED_SOURCED),
    FieldDef::single(MBP, "MembershipPersonRank", "rank", "Rank", ValueKind::Text, SOURCED),
    FieldDef::single(
        MBP,
        "MembershipPersonRealStart",
        "realstart",
        "Real start date",
        ValueKind::Bool,
        SOURCED_OPTIONAL,
    ),
    FieldDef::single(
        MBP,
        "MembershipPersonRealEnd",
        "realend",
        "Real end date",
        ValueKind::Bool,
        SOURCED_OPTIONAL,
    ),
    FieldDef::single(
        MBP,
        "MembershipPersonStartContext",
        "startcontext",
        "Context for start date",
        ValueKind::Text,
        SOURCED,
    ),
    FieldDef::single(
        MBP,
        "MembershipPersonEndContext",
        "endcontext",
        "Context for end date",
        ValueKind::Text,
        SOURCED,
    ),
    FieldDef::single(
        MBP,
        "MembershipPersonFirstCitedDate",
        "firstciteddate",
        "Date first cited",
        ValueKind::Date,
        SOURCED,
    ),
    FieldDef::single(
        MBP,
        "MembershipPersonLastCitedDate",
        "lastciteddate",
        "Date last cited",
        ValueKind::Date,
        SOURCED,
    ),
];

pub static MEMBERSHIP_PERSON: EntitySchema = EntitySchema {
    kind: MBP,
    fields: &MEMBERSHIP_PERSON_FIELDS,
    required: &["MembershipPersonMember", "MembershipPersonOrganization"],
    title: "MembershipPersonMember",
};

const MBO: EntityKind = EntityKind::MembershipOrganization;

static MEMBERSHIP_ORGANIZATION_FIELDS: [FieldDef; 4] = [
    FieldDef::single(
        MBO,
        "MembershipOrganizationMember",
        "member",
        "Member",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(
        MBO,
        "MembershipOrganizationOrganization",
        "organization",
        "Organization",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(
        MBO,
        "MembershipOrganizationFirstCitedDate",
        "firstciteddate",
        "Date first cited",
        ValueKind::Date,
        SOURCED,
    ),
    FieldDef::single(
        MBO,
        "MembershipOrganizationLastCitedDate",
        "lastciteddate",
        "Date last cited",
        ValueKind::Date,
        SOURCED,
    ),
];

pub static MEMBERSHIP_ORGANIZATION: EntitySchema = EntitySchema {
    kind: MBO,
    fields: &MEMBERSHIP_ORGANIZATION_FIELDS,
    required: &["MembershipOrganizationMember", "MembershipOrganizationOrganization"],
    title: "MembershipOrganizationMember",
};

const CMP: EntityKind = EntityKind::Composition;

static COMPOSITION_FIELDS: [FieldDef; 7] = [
    FieldDef::single(
        CMP,
        "CompositionParent",
        "parent",
        "Parent organization",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(
        CMP,
        "CompositionChild",
        "child",
        "Child organization",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(CMP, "CompositionStartDate", "startdate", "Start date", ValueKind::Date, SOURCED),
    FieldDef::single(
        CMP,
        "CompositionRealStart",
        "realstart",
        "Real start date",
        ValueKind::Bool,
        SOURCED_OPTIONAL,
    ),
    FieldDef::single(CMP, "CompositionEndDate", "enddate", "End date", ValueKind::Date, SOURCED),
    FieldDef::single(
        CMP,
        "CompositionOpenEnded",
        "open_ended",
        "Is the end date open-ended?",
        ValueKind::Text,
        SOURCED_OPTIONAL,
    ),
    FieldDef::single(
        CMP,
        "CompositionClassification",
        "classification",
        "Classification",
        ValueKind::Text,
        SOURCED,
    ),
];

pub static COMPOSITION: EntitySchema = EntitySchema {
    kind: CMP,
    fields: &COMPOSITION_FIELDS,
    required: &["CompositionParent", "CompositionChild"],
    title: "CompositionParent",
};

const ASC: EntityKind = EntityKind::Association;

static ASSOCIATION_FIELDS: [FieldDef; 5] = [
    FieldDef::single(ASC, "AssociationStartDate", "startdate", "Start date", ValueKind::Date, SOURCED),
    FieldDef::single(ASC, "AssociationEndDate", "enddate", "End date", ValueKind::Date, SOURCED),
    FieldDef::single(
        ASC,
        "AssociationOrganization",
        "organization",
        "Organization",
        ValueKind::ForeignRef(EntityKind::Organization),
        SOURCED,
    ),
    FieldDef::single(
        ASC,
        "AssociationArea",
        "area",
        "Area",
        ValueKind::ForeignRef(EntityKind::Area),
        SOURCED,
    ),
    FieldDef::single(ASC, "AssociationOpenEnded", "open_ended", "Open ended", ValueKind::Bool, PLAIN),
];

pub static ASSOCIATION: EntitySchema = EntitySchema {
    kind: ASC,
    fields: &ASSOCIATION_FIELDS,
    required: &["AssociationOrganization", "AssociationArea"],
    title: "AssociationOrganization",
};

// =============================================================================
// REGISTRY
// =============================================================================

/// A field accessor resolved from strings.
#[derive(Debug, Clone, Copy)]
pub enum FieldAccessor {
    Single(ComplexField),
    List(ComplexFieldList),
}

impl FieldAccessor {
    #[must_use]
    pub fn def(&self) -> &'static FieldDef {
        match self {
            FieldAccessor::Single(field) => field.def(),
            FieldAccessor::List(list) => list.def(),
        }
    }
}

/// Lookup table from qualified key to field definition.
#[derive(Debug)]
pub struct Registry {
    by_key: BTreeMap<String, &'static FieldDef>,
}

impl Registry {
    /// Build the registry from every static schema.
    #[must_use]
    pub fn new() -> Self {
        let by_key = EntityKind::ALL
            .into_iter()
            .flat_map(|kind| EntitySchema::of(kind).fields.iter())
            .map(|def| (def.key(), def))
            .collect();
        Self { by_key }
    }

    /// The process-wide registry, built on first use.
    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(Registry::new)
    }

    /// Resolve a qualified key such as `Organization_OrganizationName`.
    pub fn resolve(&self, key: &str) -> Result<(&'static EntitySchema, &'static FieldDef), AttestaError> {
        let (type_name, _) = key
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| AttestaError::UnknownField(key.to_string()))?;
        let kind = EntityKind::from_name(type_name)
            .ok_or_else(|| AttestaError::UnknownEntityKind(type_name.to_string()))?;
        let def = self
            .by_key
            .get(key)
            .copied()
            .ok_or_else(|| AttestaError::UnknownField(key.to_string()))?;
        Ok((EntitySchema::of(kind), def))
    }

    /// Resolve an accessor from an entity type name, an entity id and a field
    /// model name, checking that the entity exists with that type.
    pub fn field_for<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        type_name: &str,
        entity: EntityId,
        model: &str,
    ) -> Result<FieldAccessor, AttestaError> {
        let kind = EntityKind::from_name(type_name)
            .ok_or_else(|| AttestaError::UnknownEntityKind(type_name.to_string()))?;
        let (_, def) = self.resolve(&format!("{}{}{}", kind.name(), KEY_SEPARATOR, model))?;
        if !store.entity_exists(kind, entity)? {
            return Err(AttestaError::EntityNotFound(entity));
        }
        Ok(match def.multiplicity {
            Multiplicity::Single => FieldAccessor::Single(ComplexField::new(entity, def)),
            Multiplicity::List => FieldAccessor::List(ComplexFieldList::new(entity, def)),
        })
    }

    /// Number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn every_schema_field_belongs_to_its_kind() {
        for kind in EntityKind::ALL {
            let schema = EntitySchema::of(kind);
            assert_eq!(schema.kind, kind);
            assert!(schema.fields.iter().all(|def| def.entity == kind));
            assert!(schema.field(schema.title).is_some(), "{} title", kind);
            for model in schema.required {
                assert!(schema.field(model).is_some(), "{} required {}", kind, model);
            }
        }
    }

    #[test]
    fn write_order_puts_lists_last() {
        let models: Vec<&str> = ORGANIZATION.write_order().map(|def| def.model).collect();
        assert_eq!(models.first(), Some(&"OrganizationName"));
        assert_eq!(
            &models[models.len() - 2..],
            &["OrganizationAlias", "OrganizationClassification"]
        );
    }

    #[test]
    fn registry_resolves_qualified_keys() {
        let registry = Registry::new();
        let total: usize = EntityKind::ALL
            .into_iter()
            .map(|kind| EntitySchema::of(kind).fields.len())
            .sum();
        assert_eq!(registry.len(), total);

        let (schema, def) = registry
            .resolve("Organization_OrganizationName")
            .expect("resolve");
        assert_eq!(schema.kind, EntityKind::Organization);
        assert!(def.policy.translated);

        assert!(matches!(
            registry.resolve("Unit_UnitName"),
            Err(AttestaError::UnknownEntityKind(_))
        ));
        assert!(matches!(
            registry.resolve("Organization_Nickname"),
            Err(AttestaError::UnknownField(_))
        ));
        assert!(matches!(
            registry.resolve("nokey"),
            Err(AttestaError::UnknownField(_))
        ));
    }

    #[test]
    fn field_for_checks_entity_type() {
        let mut store = MemoryStore::new();
        let person = store.insert_entity(EntityKind::Person).expect("insert");
        let registry = Registry::global();

        let accessor = registry
            .field_for(&store, "person", person.id, "PersonAlias")
            .expect("resolve");
        assert!(matches!(accessor, FieldAccessor::List(_)));
        assert_eq!(accessor.def().model, "PersonAlias");

        let wrong_type = registry.field_for(&store, "Organization", person.id, "OrganizationName");
        assert!(matches!(wrong_type, Err(AttestaError::EntityNotFound(_))));
    }

    #[test]
    fn relationships_require_their_endpoints() {
        for schema in [&MEMBERSHIP_PERSON, &MEMBERSHIP_ORGANIZATION, &COMPOSITION, &ASSOCIATION] {
            assert_eq!(schema.required.len(), 2, "{}", schema.kind);
            for model in schema.required {
                let def = schema.field(model).expect("required field");
                assert!(
                    matches!(def.kind, ValueKind::ForeignRef(_)),
                    "{} {}",
                    schema.kind,
                    model
                );
            }
        }

        let (_, area) = Registry::global()
            .resolve("Association_AssociationArea")
            .expect("resolve");
        assert_eq!(area.kind, ValueKind::ForeignRef(EntityKind::Area));
    }
}

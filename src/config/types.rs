//! Static table catalog: every table, column, label and alias the service knows about.

use serde::{Deserialize, Serialize};

/// The record kinds exposed over HTTP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Building,
    Entity,
    ClientContact,
    BuildingContact,
}

/// Column type; drives coercion, SQL casts and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Decimal,
    /// Boolean-like flag persisted as 0/1.
    Flag,
    Text,
    /// Two-letter upper-case state/region code.
    StateCode,
    Date,
    Email,
}

impl ColumnType {
    /// PostgreSQL type used when casting bound parameters.
    pub fn pg_type(self) -> &'static str {
        match self {
            ColumnType::Int => "integer",
            ColumnType::Decimal => "numeric",
            ColumnType::Flag => "smallint",
            ColumnType::Text | ColumnType::StateCode | ColumnType::Email => "text",
            ColumnType::Date => "date",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    /// Canonical snake_case column name.
    pub name: &'static str,
    /// Field label in the hosted table.
    pub label: &'static str,
    /// Other external spellings accepted on input.
    pub aliases: &'static [&'static str],
    pub ty: ColumnType,
}

/// How a row signals that it has been removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteSignal {
    /// `is_deleted = 1`, with `deleted_at` stamped.
    SoftDelete,
    /// `is_active = 0` on the association table.
    Inactive,
}

#[derive(Clone, Copy, Debug)]
pub struct TableDef {
    pub kind: EntityKind,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub path_segment: &'static str,
    /// Singular spelling also accepted in paths (`/entity/1`).
    pub path_alias: &'static str,
    pub columns: &'static [ColumnDef],
    pub required: &'static [&'static str],
    pub natural_key: &'static [&'static str],
    pub delete_signal: DeleteSignal,
    pub read_only: bool,
    pub hard_delete: bool,
    /// Columns echoed back in the ingest response.
    pub echo: &'static [&'static str],
}

const fn col(name: &'static str, label: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        label,
        aliases: &[],
        ty,
    }
}

const fn col_aliased(
    name: &'static str,
    label: &'static str,
    aliases: &'static [&'static str],
    ty: ColumnType,
) -> ColumnDef {
    ColumnDef {
        name,
        label,
        aliases,
        ty,
    }
}

use ColumnType::*;

pub const BUILDING: TableDef = TableDef {
    kind: EntityKind::Building,
    table: "building",
    primary_key: "building_id",
    path_segment: "buildings",
    path_alias: "building",
    columns: &[
        col("mortgagee_id", "mortgagee_id", Int),
        col("address_normalized", "Address Normalized", Text),
        col_aliased("bld_number", "Bld#", &["Bld Number", "Building Number"], Int),
        col("owner_occupied", "Owner Occupied", Flag),
        col("street_address", "Street Address", Text),
        col("city", "City", Text),
        col("state", "State", StateCode),
        col_aliased("zip_code", "Zip", &["Zip Code"], Text),
        col("county", "County", Text),
        col("units", "Units", Int),
        col_aliased("construction_code", "construction_code", &["Construction Code"], Int),
        col("year_built", "Year Built", Int),
        col("stories", "Stories", Int),
        col("square_feet", "Square Feet", Int),
        col("desired_building_coverage", "Desired Building Coverage", Decimal),
        col("fire_alarm", "Fire Alarm", Flag),
        col("sprinkler_system", "Sprinkler System", Flag),
        col("roof_year_updated", "roof_year_updated", Int),
        col("plumbing_year_updated", "plumbing_year_updated", Int),
        col("electrical_year_updated", "electrical_year_updated", Int),
        col("hvac_year_updated", "hvac_year_updated", Int),
        col("entity_id", "entity_id", Int),
    ],
    required: &[
        "bld_number",
        "owner_occupied",
        "street_address",
        "city",
        "state",
        "zip_code",
        "county",
        "construction_code",
        "fire_alarm",
        "sprinkler_system",
    ],
    natural_key: &["address_normalized", "bld_number"],
    delete_signal: DeleteSignal::SoftDelete,
    read_only: false,
    hard_delete: false,
    echo: &["address_normalized"],
};

pub const ENTITY: TableDef = TableDef {
    kind: EntityKind::Entity,
    table: "entity",
    primary_key: "entity_id",
    path_segment: "entities",
    path_alias: "entity",
    columns: &[
        col("legal_name", "Legal Name", Text),
        col("state_registration", "State Registration", StateCode),
        col("entity_start_date", "Entity Start Date", Date),
        col("fein", "FEIN", Text),
        col_aliased("sos_url", "SOS URL", &["Registration URL"], Text),
    ],
    required: &["legal_name"],
    natural_key: &["legal_name"],
    delete_signal: DeleteSignal::SoftDelete,
    read_only: false,
    hard_delete: false,
    echo: &["legal_name"],
};

pub const CLIENT_CONTACT: TableDef = TableDef {
    kind: EntityKind::ClientContact,
    table: "client_contact",
    primary_key: "client_contact_id",
    path_segment: "clientcontacts",
    path_alias: "clientcontact",
    columns: &[
        col("first_name", "First Name", Text),
        col("last_name", "Last Name", Text),
        col("mailing_address", "Mailing Address", Text),
        col("physical_address", "Physical Address", Text),
        col("phone", "Phone", Text),
        col("email", "Email", Email),
        col("is_primary", "Is Primary", Flag),
        col_aliased("parent_contact_id", "parent_contact_id", &["Parent Contact"], Int),
    ],
    required: &["first_name", "last_name"],
    natural_key: &[],
    delete_signal: DeleteSignal::SoftDelete,
    read_only: false,
    hard_delete: true,
    echo: &[],
};

pub const BUILDING_CONTACT: TableDef = TableDef {
    kind: EntityKind::BuildingContact,
    table: "building_contact",
    primary_key: "building_contact_id",
    path_segment: "building_contacts",
    path_alias: "building_contact",
    columns: &[
        col("building_id", "building_id", Int),
        col("client_contact_id", "client_contact_id", Int),
        col("role", "Role", Text),
        col("is_primary", "Is Primary", Flag),
        col("is_active", "Is Active", Flag),
    ],
    required: &[],
    natural_key: &[],
    delete_signal: DeleteSignal::Inactive,
    read_only: true,
    hard_delete: false,
    echo: &[],
};

/// All tables, in catalog order.
pub const CATALOG: &[TableDef] = &[BUILDING, ENTITY, CLIENT_CONTACT, BUILDING_CONTACT];

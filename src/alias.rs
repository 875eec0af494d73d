//! Field-name translation between hosted-table labels ("Bld#", "Street Address") and
//! canonical snake_case column names, in both directions.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use serde_json::{Map, Value};

/// Fallback for keys with no catalog entry: trim, lowercase, spaces to underscores.
/// e.g. "Roof Year Updated" -> "roof_year_updated"
pub fn to_snake_key(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "_")
}

/// Canonical name for an inbound key, and whether the key was already canonical.
pub fn canonical_key(entity: &ResolvedEntity, key: &str) -> (String, bool) {
    let key = key.trim();
    if entity.is_column(key) || key == entity.pk_column {
        return (key.to_string(), true);
    }
    if let Some(name) = entity.column_for_label(key) {
        return (name.to_string(), false);
    }
    (to_snake_key(key), false)
}

/// Unwrap a request body: `{fields: {...}}`, then `{records: [{fields: {...}}]}`, then the raw object.
pub fn unwrap_fields(payload: Value) -> Result<Map<String, Value>, AppError> {
    let Value::Object(mut obj) = payload else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    if let Some(Value::Object(fields)) = obj.remove("fields") {
        return Ok(fields);
    }
    if let Some(Value::Array(records)) = obj.get_mut("records") {
        if let Some(Value::Object(first)) = records.first_mut() {
            if let Some(Value::Object(fields)) = first.remove("fields") {
                return Ok(fields);
            }
        }
    }
    Ok(obj)
}

/// Rename every key to its canonical form. Unknown keys pass through normalized.
/// When a canonical key and an alias land on the same column, the canonical key wins.
pub fn normalize_fields(entity: &ResolvedEntity, fields: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(fields.len());
    for (k, v) in fields {
        let (name, exact) = canonical_key(entity, &k);
        if exact {
            out.insert(name, v);
        } else {
            out.entry(name).or_insert(v);
        }
    }
    out
}

/// Rename canonical keys to hosted-table labels (for change feeds and pushes).
pub fn to_external(entity: &ResolvedEntity, row: Map<String, Value>) -> Map<String, Value> {
    row.into_iter()
        .map(|(k, v)| (entity.label_for(&k), v))
        .collect()
}

/// Build the natural address key: "street, city, state zip" with blank parts dropped
/// and the zip cut to five characters.
pub fn normalize_address(street: Option<&Value>, city: Option<&Value>, state: Option<&Value>, zip: Option<&Value>) -> String {
    let part = |v: Option<&Value>| -> String {
        match v {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    };
    let zip: String = part(zip).chars().take(5).collect();
    let core = [part(street), part(city), part(state)]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if zip.is_empty() {
        core
    } else {
        format!("{} {}", core, zip).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityKind};
    use serde_json::json;

    fn entity(kind: EntityKind) -> ResolvedEntity {
        resolve().unwrap().entity(kind).unwrap().clone()
    }

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn documented_aliases_map_to_snake_case() {
        let building = entity(EntityKind::Building);
        assert_eq!(canonical_key(&building, "Bld#").0, "bld_number");
        assert_eq!(canonical_key(&building, "Zip").0, "zip_code");
        assert_eq!(canonical_key(&building, "Street Address").0, "street_address");
        assert_eq!(canonical_key(&building, "Desired Building Coverage").0, "desired_building_coverage");
        assert_eq!(canonical_key(&building, " fire alarm ").0, "fire_alarm");

        let ent = entity(EntityKind::Entity);
        assert_eq!(canonical_key(&ent, "State Registration").0, "state_registration");
        assert_eq!(canonical_key(&ent, "FEIN").0, "fein");
    }

    #[test]
    fn unknown_keys_pass_through_normalized() {
        let building = entity(EntityKind::Building);
        let out = normalize_fields(&building, obj(json!({ "Roof Material": "slate", "DB Synced At": "x" })));
        assert_eq!(out.get("roof_material"), Some(&json!("slate")));
        assert_eq!(out.get("db_synced_at"), Some(&json!("x")));
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let building = entity(EntityKind::Building);
        let out = normalize_fields(&building, obj(json!({ "zip_code": "25301", "Zip": "99999" })));
        assert_eq!(out.get("zip_code"), Some(&json!("25301")));
        let out = normalize_fields(&building, obj(json!({ "Zip": "99999", "zip_code": "25301" })));
        assert_eq!(out.get("zip_code"), Some(&json!("25301")));
    }

    #[test]
    fn envelopes_unwrap_in_priority_order() {
        let fields = unwrap_fields(json!({ "fields": { "City": "X" }, "records": [{ "fields": { "City": "Y" } }] })).unwrap();
        assert_eq!(fields.get("City"), Some(&json!("X")));

        let fields = unwrap_fields(json!({ "records": [{ "id": "rec1", "fields": { "City": "Y" } }] })).unwrap();
        assert_eq!(fields.get("City"), Some(&json!("Y")));

        let fields = unwrap_fields(json!({ "City": "Z", "building_id": 4 })).unwrap();
        assert_eq!(fields.get("building_id"), Some(&json!(4)));

        assert!(matches!(unwrap_fields(json!([1, 2])), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn external_names_round_trip_labels() {
        let building = entity(EntityKind::Building);
        let ext = to_external(
            &building,
            obj(json!({ "building_id": 3, "bld_number": 1, "zip_code": "25301", "updated_at": "t" })),
        );
        assert_eq!(ext.get("Bld#"), Some(&json!(1)));
        assert_eq!(ext.get("Zip"), Some(&json!("25301")));
        assert_eq!(ext.get("building_id"), Some(&json!(3)));
        assert_eq!(ext.get("updated_at"), Some(&json!("t")));

        let back = normalize_fields(&building, ext);
        assert_eq!(back.get("bld_number"), Some(&json!(1)));
        assert_eq!(back.get("zip_code"), Some(&json!("25301")));
    }

    #[test]
    fn address_normalization_matches_documented_form() {
        let s = normalize_address(
            Some(&json!(" 1 Main St ")),
            Some(&json!("X")),
            Some(&json!("WV")),
            Some(&json!("25301-1234")),
        );
        assert_eq!(s, "1 Main St, X, WV 25301");
        assert_eq!(normalize_address(Some(&json!("1 Main St")), None, Some(&json!("WV")), None), "1 Main St, WV");
        assert_eq!(normalize_address(None, None, None, Some(&json!(25301))), "25301");
    }
}

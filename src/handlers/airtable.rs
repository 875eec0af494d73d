//! Change-feed handlers used by the Airtable automations: ingest, update, delete, restore, changes.

use crate::alias::{normalize_fields, unwrap_fields};
use crate::config::{ColumnType, ResolvedEntity};
use crate::error::AppError;
use crate::handlers::entity::{entity_for, writable};
use crate::response::status_ok;
use crate::service::{bucket, coerce_value, is_blank, parse_since, CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
pub struct ChangesParams {
    pub since: Option<String>,
}

/// Split a request body into aliased fields plus the top-level object (for id and flags).
fn split_body(entity: &ResolvedEntity, body: Value) -> Result<(Map<String, Value>, Map<String, Value>), AppError> {
    let top = match &body {
        Value::Object(m) => m.clone(),
        _ => Map::new(),
    };
    let fields = normalize_fields(entity, unwrap_fields(body)?);
    Ok((fields, top))
}

/// Record id from the fields first, then the top-level body.
fn take_id(entity: &ResolvedEntity, fields: &mut Map<String, Value>, top: &Map<String, Value>) -> Result<i64, AppError> {
    let pk = entity.pk_column.as_str();
    let raw = fields
        .remove(pk)
        .filter(|v| !is_blank(v))
        .or_else(|| top.get(pk).filter(|v| !is_blank(v)).cloned())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", pk)))?;
    match coerce_value(pk, &raw, ColumnType::Int) {
        Ok(Value::Number(n)) => n.as_i64().ok_or_else(|| AppError::BadRequest(format!("invalid {}", pk))),
        _ => Err(AppError::BadRequest(format!("invalid {}: {}", pk, raw))),
    }
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(v) => coerce_value("hard", v, ColumnType::Flag)
            .ok()
            .and_then(|v| v.as_i64())
            .map(|n| n == 1)
            .unwrap_or(false),
        None => false,
    }
}

fn id_body(entity: &ResolvedEntity, key: &str, count: u64, id: i64) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(key.into(), Value::from(count));
    body.insert(entity.pk_column.clone(), Value::from(id));
    body
}

pub async fn ingest(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let (mut fields, _) = split_body(entity, body)?;
    fields.remove(&entity.pk_column);
    RequestValidator::prepare_create(entity, &mut fields)?;
    let outcome = CrudService::insert(&state.pool, entity, &fields).await?;
    tracing::info!(table = %entity.table_name, id = outcome.id, existing = outcome.existing, "ingested");

    let mut out = Map::new();
    out.insert(entity.pk_column.clone(), Value::from(outcome.id));
    for col in &entity.echo {
        out.insert(col.clone(), fields.get(col).cloned().unwrap_or(Value::Null));
    }
    Ok(status_ok(out))
}

pub async fn update(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let (mut fields, top) = split_body(entity, body)?;
    let id = take_id(entity, &mut fields, &top)?;
    RequestValidator::coerce(entity, &mut fields)?;
    let n = CrudService::update(&state.pool, entity, id, &fields).await?;
    Ok(status_ok(id_body(entity, "updated", n, id)))
}

/// Soft delete; `"hard": true` physically removes rows on tables that allow it.
pub async fn delete(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let (mut fields, top) = split_body(entity, body)?;
    let hard = truthy(fields.get("hard")) || truthy(top.get("hard"));
    if hard && !entity.hard_delete {
        return Err(AppError::BadRequest(format!("{} does not support hard delete", entity.path_segment)));
    }
    let id = take_id(entity, &mut fields, &top)?;
    let n = if hard {
        CrudService::hard_delete(&state.pool, entity, id).await?;
        1
    } else {
        CrudService::soft_delete(&state.pool, entity, id).await?
    };
    tracing::info!(table = %entity.table_name, id, hard, rows = n, "delete");
    Ok(status_ok(id_body(entity, "deleted", n, id)))
}

pub async fn restore(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let (mut fields, top) = split_body(entity, body)?;
    let id = take_id(entity, &mut fields, &top)?;
    let n = CrudService::restore(&state.pool, entity, id).await?;
    Ok(status_ok(id_body(entity, "restored", n, id)))
}

pub async fn changes(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<ChangesParams>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let since = parse_since(params.since.as_deref())?;
    let (now, rows) = CrudService::changes(&state.pool, entity, since).await?;
    Ok(Json(bucket(entity, now, rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityKind};
    use serde_json::json;

    fn building() -> ResolvedEntity {
        resolve().unwrap().entity(EntityKind::Building).unwrap().clone()
    }

    #[test]
    fn id_prefers_fields_over_top_level() {
        let e = building();
        let (mut fields, top) = split_body(&e, json!({ "building_id": 9, "fields": { "building_id": "4", "City": "X" } })).unwrap();
        assert_eq!(take_id(&e, &mut fields, &top).unwrap(), 4);
        assert!(!fields.contains_key("building_id"));
        assert_eq!(fields.get("city"), Some(&json!("X")));
    }

    #[test]
    fn id_falls_back_to_top_level() {
        let e = building();
        let (mut fields, top) = split_body(&e, json!({ "building_id": 9, "fields": { "City": "X" } })).unwrap();
        assert_eq!(take_id(&e, &mut fields, &top).unwrap(), 9);
    }

    #[test]
    fn missing_or_bad_id_is_a_bad_request() {
        let e = building();
        let (mut fields, top) = split_body(&e, json!({ "fields": { "City": "X" } })).unwrap();
        assert!(matches!(take_id(&e, &mut fields, &top), Err(AppError::BadRequest(_))));
        let (mut fields, top) = split_body(&e, json!({ "building_id": "abc" })).unwrap();
        assert!(matches!(take_id(&e, &mut fields, &top), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn hard_flag_accepts_flag_spellings() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!("nope"))));
        assert!(!truthy(None));
    }
}

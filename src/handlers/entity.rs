//! Direct record CRUD handlers: list, create, read, update, delete.

use crate::alias::{normalize_fields, unwrap_fields};
use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

pub(crate) fn entity_for<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity '{}'", path_segment)))
}

pub(crate) fn writable(entity: &ResolvedEntity) -> Result<(), AppError> {
    if entity.read_only {
        return Err(AppError::BadRequest(format!("{} is read-only", entity.path_segment)));
    }
    Ok(())
}

fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id_str)))
}

fn not_found(entity: &ResolvedEntity, id: i64) -> AppError {
    AppError::NotFound(format!("{} {} not found", entity.table_name, id))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let rows = CrudService::list(&state.pool, entity, params.limit, params.skip).await?;
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let mut fields = normalize_fields(entity, unwrap_fields(body)?);
    fields.remove(&entity.pk_column);
    RequestValidator::prepare_create(entity, &mut fields)?;
    let outcome = CrudService::insert(&state.pool, entity, &fields).await?;
    let row = CrudService::read(&state.pool, entity, outcome.id, true)
        .await?
        .ok_or_else(|| not_found(entity, outcome.id))?;
    let (status, json) = if outcome.existing {
        success_one_ok(row)
    } else {
        success_one(row)
    };
    Ok((status, json))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::read(&state.pool, entity, id, false)
        .await?
        .ok_or_else(|| not_found(entity, id))?;
    Ok(success_one_ok(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let id = parse_id(&id_str)?;
    let mut fields = normalize_fields(entity, unwrap_fields(body)?);
    fields.remove(&entity.pk_column);
    RequestValidator::coerce(entity, &mut fields)?;
    CrudService::update(&state.pool, entity, id, &fields).await?;
    let row = CrudService::read(&state.pool, entity, id, false)
        .await?
        .ok_or_else(|| not_found(entity, id))?;
    Ok(success_one_ok(row))
}

/// Hard delete for tables that allow it, soft delete otherwise. Returns the removed row.
pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    writable(entity)?;
    let id = parse_id(&id_str)?;
    if entity.hard_delete {
        let row = CrudService::hard_delete(&state.pool, entity, id).await?;
        tracing::info!(table = %entity.table_name, id, "row removed");
        return Ok(success_one_ok(row));
    }
    if CrudService::soft_delete(&state.pool, entity, id).await? == 0 {
        return Err(not_found(entity, id));
    }
    let row = CrudService::read(&state.pool, entity, id, true)
        .await?
        .ok_or_else(|| not_found(entity, id))?;
    Ok(success_one_ok(row))
}

//! Building sync triggers: push local rows to Airtable, pull Airtable rows into the database.

use crate::airtable::HostedTable;
use crate::config::{EntityKind, ResolvedEntity};
use crate::error::AppError;
use crate::service::{SyncReport, SyncService};
use crate::state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

fn hosted(state: &AppState) -> Result<Arc<dyn HostedTable>, AppError> {
    state
        .hosted
        .clone()
        .ok_or_else(|| AppError::Unavailable("Airtable is not configured (AIRTABLE_API_KEY, AIRTABLE_BASE_ID)".into()))
}

fn buildings(state: &AppState) -> Result<&ResolvedEntity, AppError> {
    state
        .model
        .entity(EntityKind::Building)
        .ok_or_else(|| AppError::NotFound("buildings".into()))
}

pub async fn sync_buildings_to_airtable(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let hosted = hosted(&state)?;
    let entity = buildings(&state)?;
    let mut report = SyncService::push(&state.pool, entity, hosted.as_ref()).await?;
    report.message = "Building synced with Airtable".into();
    Ok(Json(report))
}

pub async fn fetch_buildings_from_airtable(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let hosted = hosted(&state)?;
    let entity = buildings(&state)?;
    let mut report = SyncService::pull(&state.pool, entity, hosted.as_ref()).await?;
    report.message = "Fetch complete".into();
    Ok(Json(report))
}

//! Sync trigger routes. Registered with and without the trailing slash.

use crate::handlers::sync::{fetch_buildings_from_airtable, sync_buildings_to_airtable};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn sync_routes(state: AppState) -> Router {
    Router::new()
        .route("/sync_buildings_to_airtable/", post(sync_buildings_to_airtable))
        .route("/sync_buildings_to_airtable", post(sync_buildings_to_airtable))
        .route("/fetch_buildings_from_airtable/", get(fetch_buildings_from_airtable))
        .route("/fetch_buildings_from_airtable", get(fetch_buildings_from_airtable))
        .with_state(state)
}

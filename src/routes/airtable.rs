//! Change-feed routes under /airtable/{entity}.

use crate::handlers::airtable::{changes, delete, ingest, restore, update};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn airtable_routes(state: AppState) -> Router {
    Router::new()
        .route("/airtable/:path_segment/ingest", post(ingest))
        .route("/airtable/:path_segment/update", post(update))
        .route("/airtable/:path_segment/delete", post(delete))
        .route("/airtable/:path_segment/restore", post(restore))
        .route("/airtable/:path_segment/changes", get(changes))
        .with_state(state)
}

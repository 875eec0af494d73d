//! Routers for every HTTP surface, and the assembled application.

mod airtable;
mod common;
mod entity;
mod sync;

pub use airtable::airtable_routes;
pub use common::common_routes;
pub use entity::entity_routes;
pub use sync::sync_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Full application: all routers merged, with request tracing and a body size limit.
pub fn app(state: AppState) -> Router {
    let body_limit = state.settings.body_limit_bytes;
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(sync_routes(state.clone()))
        .merge(airtable_routes(state.clone()))
        .merge(entity_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}

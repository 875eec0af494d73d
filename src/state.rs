//! Shared application state for all routes.

use crate::airtable::HostedTable;
use crate::config::{ResolvedModel, Settings};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
    /// None when no hosted-table credentials are configured; sync routes answer 503.
    pub hosted: Option<Arc<dyn HostedTable>>,
    pub settings: Arc<Settings>,
}

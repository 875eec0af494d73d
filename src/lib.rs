//! propsync: building, entity and client-contact records in PostgreSQL, with an
//! Airtable change feed and push/pull sync.

pub mod airtable;
pub mod alias;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use airtable::{AirtableClient, AirtableRecord, HostedTable};
pub use config::{resolve, EntityKind, ResolvedEntity, ResolvedModel, Settings};
pub use error::{AppError, ConfigError};
pub use routes::{airtable_routes, app, common_routes, entity_routes, sync_routes};
pub use service::{CrudService, SyncReport, SyncService};
pub use state::AppState;

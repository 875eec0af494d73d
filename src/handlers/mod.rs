//! HTTP handlers for record CRUD, the Airtable change feed and sync triggers.

pub mod airtable;
pub mod entity;
pub mod sync;

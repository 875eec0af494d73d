//! Services behind the handlers: validation, CRUD, change feed and hosted-table sync.

mod changes;
mod crud;
mod sync;
mod validation;
pub use changes::{bucket, parse_since, ChangeSet};
pub use crud::{CrudService, InsertOutcome, DEFAULT_LIMIT, MAX_LIMIT};
pub use sync::{SyncReport, SyncService};
pub use validation::{coerce_value, is_blank, parse_date, RequestValidator};

//! Change feed: cursor parsing and upsert/delete bucketing in external field names.

use crate::alias::to_external;
use crate::config::{DeleteSignal, ResolvedEntity};
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ChangeSet {
    /// Cursor for the next call.
    pub now: String,
    pub upserts: Vec<Value>,
    pub deletes: Vec<Value>,
}

/// Parse a `since` cursor. Absent or blank means the epoch.
pub fn parse_since(raw: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DateTime::<Utc>::UNIX_EPOCH);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(AppError::BadRequest(format!(
        "since must be an ISO-8601 timestamp, got '{}'",
        s
    )))
}

fn is_delete(entity: &ResolvedEntity, row: &Value) -> bool {
    let flag = |name: &str| row.get(name).and_then(Value::as_i64);
    match entity.delete_signal {
        DeleteSignal::SoftDelete => flag("is_deleted") == Some(1),
        DeleteSignal::Inactive => flag("is_active") == Some(0),
    }
}

/// Split rows into upserts and deletes, renaming keys to external labels.
pub fn bucket(entity: &ResolvedEntity, now: String, rows: Vec<Value>) -> ChangeSet {
    let mut upserts = Vec::new();
    let mut deletes = Vec::new();
    for row in rows {
        let deleted = is_delete(entity, &row);
        let Value::Object(map) = row else { continue };
        let external = Value::Object(to_external(entity, map));
        if deleted {
            deletes.push(external);
        } else {
            upserts.push(external);
        }
    }
    ChangeSet { now, upserts, deletes }
}

//! Best-effort push and pull between local rows and a hosted table, matched by natural key.

use crate::airtable::HostedTable;
use crate::alias::{normalize_fields, to_external};
use crate::config::{ResolvedEntity, SOFT_DELETE_COLUMNS, UPDATED_AT};
use crate::error::AppError;
use crate::service::crud::{CrudService, MAX_LIMIT};
use crate::service::validation::{is_blank, RequestValidator};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub message: String,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Pulled {
    Created,
    Updated,
    Skipped,
}

pub struct SyncService;

impl SyncService {
    /// Push every live row to the hosted table: patch the matching record or create one.
    pub async fn push(
        pool: &PgPool,
        entity: &ResolvedEntity,
        hosted: &dyn HostedTable,
    ) -> Result<SyncReport, AppError> {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let page = CrudService::list(pool, entity, Some(MAX_LIMIT), Some(offset)).await?;
            let n = page.len() as u32;
            rows.extend(page);
            if n < MAX_LIMIT {
                break;
            }
            offset += n;
        }
        Self::push_rows(entity, hosted, rows).await
    }

    /// Push already-loaded rows (canonical keys). Listing the remote table is the only hard failure.
    pub async fn push_rows(
        entity: &ResolvedEntity,
        hosted: &dyn HostedTable,
        rows: Vec<Value>,
    ) -> Result<SyncReport, AppError> {
        let remote = hosted.list_records().await?;
        let mut by_key: HashMap<String, String> = HashMap::new();
        for rec in remote {
            let mut fields = normalize_fields(entity, rec.fields);
            RequestValidator::derive(entity, &mut fields);
            if let Some(key) = natural_key_string(entity, &fields) {
                by_key.entry(key).or_insert(rec.id);
            }
        }

        let mut report = SyncReport::default();
        for row in rows {
            let Value::Object(row) = row else {
                report.skipped += 1;
                continue;
            };
            let key = natural_key_string(entity, &row);
            let fields = outbound_fields(entity, row);
            let result = match key.as_ref().and_then(|k| by_key.get(k)) {
                Some(record_id) => hosted.update_record(record_id, fields).await.map(|_| false),
                None => hosted.create_record(fields).await.map(|_| true),
            };
            match result {
                Ok(true) => report.created += 1,
                Ok(false) => report.updated += 1,
                Err(e) => {
                    tracing::warn!(table = %entity.table_name, key = ?key, error = %e, "push failed; continuing");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            table = %entity.table_name,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "push complete"
        );
        Ok(report)
    }

    /// Pull every hosted record into the local table: update by natural key or insert.
    pub async fn pull(
        pool: &PgPool,
        entity: &ResolvedEntity,
        hosted: &dyn HostedTable,
    ) -> Result<SyncReport, AppError> {
        let records = hosted.list_records().await?;
        let mut report = SyncReport::default();
        for rec in records {
            match Self::pull_one(pool, entity, rec.fields).await {
                Ok(Pulled::Created) => report.created += 1,
                Ok(Pulled::Updated) => report.updated += 1,
                Ok(Pulled::Skipped) => {
                    tracing::warn!(table = %entity.table_name, record = %rec.id, "record skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(table = %entity.table_name, record = %rec.id, error = %e, "pull failed; continuing");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            table = %entity.table_name,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            skipped = report.skipped,
            "pull complete"
        );
        Ok(report)
    }

    async fn pull_one(
        pool: &PgPool,
        entity: &ResolvedEntity,
        fields: Map<String, Value>,
    ) -> Result<Pulled, AppError> {
        let mut fields = normalize_fields(entity, fields);
        fields.remove(&entity.pk_column);
        RequestValidator::coerce(entity, &mut fields)?;
        RequestValidator::derive(entity, &mut fields);
        let Some(key) = natural_key_values(entity, &fields) else {
            return Ok(Pulled::Skipped);
        };
        match CrudService::find_by_natural_key(pool, entity, &key).await? {
            Some(id) => {
                let n = CrudService::update(pool, entity, id, &fields).await?;
                Ok(if n > 0 { Pulled::Updated } else { Pulled::Skipped })
            }
            None => {
                RequestValidator::require(entity, &fields)?;
                let out = CrudService::insert(pool, entity, &fields).await?;
                Ok(if out.existing { Pulled::Skipped } else { Pulled::Created })
            }
        }
    }
}

/// Natural-key values in key order; None if any part is blank.
fn natural_key_values(entity: &ResolvedEntity, fields: &Map<String, Value>) -> Option<Vec<Value>> {
    if entity.natural_key.is_empty() {
        return None;
    }
    entity
        .natural_key
        .iter()
        .map(|k| fields.get(k).filter(|v| !is_blank(v)).cloned())
        .collect()
}

/// Comparable form of the natural key: trimmed, case-folded strings and integers as decimal text.
fn natural_key_string(entity: &ResolvedEntity, fields: &Map<String, Value>) -> Option<String> {
    let parts = natural_key_values(entity, fields)?;
    let parts: Option<Vec<String>> = parts.iter().map(key_part).collect();
    parts.map(|p| p.join("|"))
}

fn key_part(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => Some(n.to_string()),
                Err(_) => Some(s.to_lowercase()),
            }
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n
                .as_f64()
                .map(|f| if f.fract() == 0.0 { (f as i64).to_string() } else { f.to_string() }),
        },
        Value::Bool(b) => Some(i64::from(*b).to_string()),
        _ => None,
    }
}

/// Row in hosted-table labels, without the primary key and bookkeeping columns.
fn outbound_fields(entity: &ResolvedEntity, mut row: Map<String, Value>) -> Map<String, Value> {
    row.remove(&entity.pk_column);
    for col in SOFT_DELETE_COLUMNS {
        row.remove(*col);
    }
    row.remove(UPDATED_AT);
    to_external(entity, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airtable::AirtableRecord;
    use crate::config::{resolve, EntityKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTable {
        records: Vec<AirtableRecord>,
        created: Mutex<Vec<Map<String, Value>>>,
        patched: Mutex<Vec<(String, Map<String, Value>)>>,
        /// Creates whose "Street Address" equals this fail.
        fail_street: Option<&'static str>,
        fail_list: bool,
    }

    #[async_trait]
    impl HostedTable for FakeTable {
        async fn list_records(&self) -> Result<Vec<AirtableRecord>, AppError> {
            if self.fail_list {
                return Err(AppError::Upstream("list failed".into()));
            }
            Ok(self.records.clone())
        }

        async fn create_record(&self, fields: Map<String, Value>) -> Result<AirtableRecord, AppError> {
            if let Some(bad) = self.fail_street {
                if fields.get("Street Address") == Some(&json!(bad)) {
                    return Err(AppError::Upstream("422 INVALID_VALUE".into()));
                }
            }
            self.created.lock().unwrap().push(fields.clone());
            Ok(AirtableRecord { id: "recNew".into(), fields, created_time: None })
        }

        async fn update_record(&self, id: &str, fields: Map<String, Value>) -> Result<AirtableRecord, AppError> {
            self.patched.lock().unwrap().push((id.to_string(), fields.clone()));
            Ok(AirtableRecord { id: id.into(), fields, created_time: None })
        }
    }

    fn building() -> ResolvedEntity {
        resolve().unwrap().entity(EntityKind::Building).unwrap().clone()
    }

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn local_row(id: i64, street: &str, bld: i64) -> Value {
        json!({
            "building_id": id,
            "address_normalized": format!("{}, X, WV 25301", street),
            "bld_number": bld,
            "street_address": street,
            "city": "X",
            "state": "WV",
            "zip_code": "25301",
            "is_deleted": 0,
            "deleted_at": null,
            "updated_at": "2025-01-01T00:00:00.000000Z"
        })
    }

    #[tokio::test]
    async fn push_patches_matches_and_creates_the_rest() {
        let table = FakeTable {
            records: vec![AirtableRecord {
                id: "recOld".into(),
                fields: fields(json!({ "Street Address": "1 Main St", "City": "x", "State": "wv", "Zip": "25301", "Bld#": "1" })),
                created_time: None,
            }],
            ..Default::default()
        };
        let rows = vec![local_row(1, "1 Main St", 1), local_row(2, "2 Oak Ave", 1)];
        let report = SyncService::push_rows(&building(), &table, rows).await.unwrap();
        assert_eq!((report.created, report.updated, report.failed), (1, 1, 0));

        let patched = table.patched.lock().unwrap();
        assert_eq!(patched[0].0, "recOld");
        assert_eq!(patched[0].1.get("Bld#"), Some(&json!(1)));
        assert!(patched[0].1.get("building_id").is_none());
        assert!(patched[0].1.get("is_deleted").is_none());
        assert!(patched[0].1.get("updated_at").is_none());

        let created = table.created.lock().unwrap();
        assert_eq!(created[0].get("Street Address"), Some(&json!("2 Oak Ave")));
    }

    #[tokio::test]
    async fn push_counts_failures_and_keeps_going() {
        let table = FakeTable {
            fail_street: Some("1 Main St"),
            ..Default::default()
        };
        let rows = vec![local_row(1, "1 Main St", 1), local_row(2, "2 Oak Ave", 1)];
        let report = SyncService::push_rows(&building(), &table, rows).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 1);
    }

    #[tokio::test]
    async fn push_aborts_when_remote_cannot_be_listed() {
        let table = FakeTable { fail_list: true, ..Default::default() };
        let err = SyncService::push_rows(&building(), &table, vec![local_row(1, "1 Main St", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(table.created.lock().unwrap().is_empty());
    }

    #[test]
    fn natural_key_is_case_and_type_insensitive() {
        let e = building();
        let a = natural_key_string(&e, &fields(json!({ "address_normalized": "1 Main St, X, WV 25301", "bld_number": 1 })));
        let b = natural_key_string(&e, &fields(json!({ "address_normalized": " 1 MAIN ST, x, wv 25301 ", "bld_number": "1" })));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert!(natural_key_string(&e, &fields(json!({ "bld_number": 1 }))).is_none());
    }
}

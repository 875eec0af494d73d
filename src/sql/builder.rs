//! Builds parameterized INSERT, SELECT, UPDATE and DELETE statements from a resolved entity.
//! Identifiers come from the catalog only; every value is a bound parameter with an explicit cast.

use crate::config::{ColumnType, ResolvedEntity, SOFT_DELETE_COLUMNS, UPDATED_AT};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from catalog).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its cast placeholder, e.g. `$3::integer`.
    fn push_param(&mut self, v: Value, ty: ColumnType) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), ty.pg_type())
    }

    fn push_timestamp(&mut self, v: Value) -> String {
        self.params.push(v);
        format!("${}::timestamptz", self.params.len())
    }
}

/// Select expression for one column, normalized so rows decode the same way
/// whatever integer width or numeric precision the table uses.
fn select_expr(name: &str, ty: ColumnType) -> String {
    let q = quoted(name);
    match ty {
        ColumnType::Int | ColumnType::Flag => format!("{}::bigint AS {}", q, q),
        ColumnType::Decimal => format!("{}::float8 AS {}", q, q),
        _ => q,
    }
}

/// SELECT list: primary key, data columns, then bookkeeping columns.
pub fn select_column_list(entity: &ResolvedEntity) -> String {
    let mut cols = vec![select_expr(&entity.pk_column, ColumnType::Int)];
    for c in &entity.columns {
        cols.push(select_expr(c.name, c.ty));
    }
    if entity.has_soft_delete() {
        for name in SOFT_DELETE_COLUMNS {
            if *name == "is_deleted" {
                cols.push(select_expr(name, ColumnType::Flag));
            } else {
                cols.push(quoted(name));
            }
        }
    } else {
        cols.push(quoted(UPDATED_AT));
    }
    cols.join(", ")
}

fn table(entity: &ResolvedEntity) -> String {
    quoted(&entity.table_name)
}

fn pk_predicate(entity: &ResolvedEntity, q: &mut QueryBuf, id: i64) -> String {
    let ph = q.push_param(Value::from(id), ColumnType::Int);
    format!("{} = {}", quoted(&entity.pk_column), ph)
}

/// INSERT of the catalog columns present in `body`; stamps `updated_at` and returns the new key.
pub fn insert(entity: &ResolvedEntity, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(val) = body.get(c.name) else { continue };
        placeholders.push(q.push_param(val.clone(), c.ty));
        cols.push(quoted(c.name));
    }
    cols.push(quoted(UPDATED_AT));
    placeholders.push("NOW()".to_string());
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}::bigint",
        table(entity),
        cols.join(", "),
        placeholders.join(", "),
        quoted(&entity.pk_column)
    );
    q
}

/// Column-selective UPDATE by id, guarded so soft-deleted rows are never touched.
/// Returns None when `body` names no catalog column (nothing to execute).
pub fn update(entity: &ResolvedEntity, id: i64, body: &Map<String, Value>) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        let Some(val) = body.get(c.name) else { continue };
        let ph = q.push_param(val.clone(), c.ty);
        sets.push(format!("{} = {}", quoted(c.name), ph));
    }
    if sets.is_empty() {
        return None;
    }
    sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    let mut predicates = vec![pk_predicate(entity, &mut q, id)];
    predicates.extend(entity.live_predicate().map(String::from));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table(entity),
        sets.join(", "),
        predicates.join(" AND ")
    );
    Some(q)
}

/// Flip the soft-delete flag on a live row.
pub fn soft_delete(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = pk_predicate(entity, &mut q, id);
    q.sql = format!(
        "UPDATE {} SET \"is_deleted\" = 1, \"deleted_at\" = NOW(), {} = NOW() WHERE {} AND \"is_deleted\" = 0",
        table(entity),
        quoted(UPDATED_AT),
        pk
    );
    q
}

/// Reverse a soft delete.
pub fn restore(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = pk_predicate(entity, &mut q, id);
    q.sql = format!(
        "UPDATE {} SET \"is_deleted\" = 0, \"deleted_at\" = NULL, {} = NOW() WHERE {} AND \"is_deleted\" = 1",
        table(entity),
        quoted(UPDATED_AT),
        pk
    );
    q
}

/// Physical DELETE by id, returning the removed row.
pub fn hard_delete(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = pk_predicate(entity, &mut q, id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} RETURNING {}",
        table(entity),
        pk,
        select_column_list(entity)
    );
    q
}

/// SELECT by primary key. Soft-deleted rows are excluded unless `include_deleted`.
pub fn select_by_id(entity: &ResolvedEntity, id: i64, include_deleted: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut predicates = vec![pk_predicate(entity, &mut q, id)];
    if !include_deleted {
        predicates.extend(entity.live_predicate().map(String::from));
    }
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_column_list(entity),
        table(entity),
        predicates.join(" AND ")
    );
    q
}

/// Primary key of the row matching the natural key, deleted or not.
/// `values` are in `entity.natural_key` order.
pub fn select_by_natural_key(entity: &ResolvedEntity, values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut predicates = Vec::new();
    for (name, val) in entity.natural_key.iter().zip(values) {
        let ty = entity.column_type(name).unwrap_or(ColumnType::Text);
        let ph = q.push_param(val.clone(), ty);
        predicates.push(format!("{} = {}", quoted(name), ph));
    }
    q.sql = format!(
        "SELECT {}::bigint FROM {} WHERE {} ORDER BY {} LIMIT 1",
        quoted(&entity.pk_column),
        table(entity),
        predicates.join(" AND "),
        quoted(&entity.pk_column)
    );
    q
}

/// Live rows ordered by primary key, with LIMIT/OFFSET.
pub fn select_list(entity: &ResolvedEntity, limit: u32, offset: u32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = entity
        .live_predicate()
        .map(|p| format!(" WHERE {}", p))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(entity),
        table(entity),
        where_clause,
        quoted(&entity.pk_column),
        limit.min(1000),
        offset
    );
    q
}

/// Rows modified in the half-open window `(since, now]`, ordered by `(updated_at, pk)`.
/// Deleted and inactive rows are included so the caller can emit them as deletes.
pub fn select_changes(entity: &ResolvedEntity, since: &str, now: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let lower = q.push_timestamp(Value::String(since.to_string()));
    let upper = q.push_timestamp(Value::String(now.to_string()));
    let updated = quoted(UPDATED_AT);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} > {} AND {} <= {} ORDER BY {}, {}",
        select_column_list(entity),
        table(entity),
        updated,
        lower,
        updated,
        upper,
        updated,
        quoted(&entity.pk_column)
    );
    q
}

/// Does a row with this id exist at all (deleted or not)?
pub fn exists(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = pk_predicate(entity, &mut q, id);
    q.sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {})", table(entity), pk);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityKind};
    use serde_json::json;

    fn entity(kind: EntityKind) -> ResolvedEntity {
        resolve().unwrap().entity(kind).unwrap().clone()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_binds_only_known_columns_and_returns_key() {
        let e = entity(EntityKind::Building);
        let q = insert(&e, &body(json!({ "city": "X", "bld_number": 1, "roof_material": "slate" })));
        assert_eq!(
            q.sql,
            "INSERT INTO \"building\" (\"bld_number\", \"city\", \"updated_at\") VALUES ($1::integer, $2::text, NOW()) RETURNING \"building_id\"::bigint"
        );
        assert_eq!(q.params, vec![json!(1), json!("X")]);
    }

    #[test]
    fn update_is_guarded_by_soft_delete_flag() {
        let e = entity(EntityKind::Building);
        let q = update(&e, 9, &body(json!({ "fire_alarm": 1 }))).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"building\" SET \"fire_alarm\" = $1::smallint, \"updated_at\" = NOW() WHERE \"building_id\" = $2::integer AND \"is_deleted\" = 0"
        );
        assert_eq!(q.params, vec![json!(1), json!(9)]);
    }

    #[test]
    fn update_without_known_columns_is_none() {
        let e = entity(EntityKind::Building);
        assert!(update(&e, 9, &body(json!({ "building_id": 9, "db_synced_at": "x" }))).is_none());
    }

    #[test]
    fn soft_delete_and_restore_flip_flag() {
        let e = entity(EntityKind::ClientContact);
        let del = soft_delete(&e, 4);
        assert!(del.sql.contains("SET \"is_deleted\" = 1, \"deleted_at\" = NOW()"));
        assert!(del.sql.ends_with("WHERE \"client_contact_id\" = $1::integer AND \"is_deleted\" = 0"));
        let res = restore(&e, 4);
        assert!(res.sql.contains("SET \"is_deleted\" = 0, \"deleted_at\" = NULL"));
        assert!(res.sql.ends_with("AND \"is_deleted\" = 1"));
    }

    #[test]
    fn natural_key_lookup_casts_each_part() {
        let e = entity(EntityKind::Building);
        let q = select_by_natural_key(&e, &[json!("1 Main St, X, WV 25301"), json!(1)]);
        assert_eq!(
            q.sql,
            "SELECT \"building_id\"::bigint FROM \"building\" WHERE \"address_normalized\" = $1::text AND \"bld_number\" = $2::integer ORDER BY \"building_id\" LIMIT 1"
        );
    }

    #[test]
    fn change_window_is_half_open_and_totally_ordered() {
        let e = entity(EntityKind::Building);
        let q = select_changes(&e, "1970-01-01T00:00:00Z", "2025-01-01T00:00:00Z");
        assert!(q.sql.contains("WHERE \"updated_at\" > $1::timestamptz AND \"updated_at\" <= $2::timestamptz"));
        assert!(q.sql.ends_with("ORDER BY \"updated_at\", \"building_id\""));
        assert!(!q.sql.contains("\"is_deleted\" = 0"));
    }

    #[test]
    fn association_table_selects_without_soft_delete_columns() {
        let e = entity(EntityKind::BuildingContact);
        let cols = select_column_list(&e);
        assert!(cols.contains("\"is_active\"::bigint AS \"is_active\""));
        assert!(!cols.contains("is_deleted"));
        let q = select_by_id(&e, 1, false);
        assert!(q.sql.ends_with("WHERE \"building_contact_id\" = $1::integer"));
    }

    #[test]
    fn reads_exclude_deleted_rows_by_default() {
        let e = entity(EntityKind::Entity);
        assert!(select_by_id(&e, 2, false).sql.ends_with("AND \"is_deleted\" = 0"));
        assert!(!select_by_id(&e, 2, true).sql.contains("\"is_deleted\" = 0"));
        assert!(select_list(&e, 5000, 0).sql.ends_with("LIMIT 1000 OFFSET 0"));
    }

    #[test]
    fn decimal_columns_select_as_float() {
        let e = entity(EntityKind::Building);
        assert!(select_column_list(&e).contains("\"desired_building_coverage\"::float8 AS \"desired_building_coverage\""));
    }
}

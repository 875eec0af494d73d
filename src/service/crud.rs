//! CRUD execution against PostgreSQL using the catalog-driven SQL builder.

use crate::config::ResolvedEntity;
use crate::error::{is_unique_violation, AppError};
use crate::sql::{self, PgBindValue, QueryBuf};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Result of an insert: the row's key, and whether it already existed under the same natural key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: i64,
    pub existing: bool,
}

pub struct CrudService;

impl CrudService {
    /// Live rows ordered by primary key; limit defaults to 100, capped at 1000.
    pub async fn list(
        pool: &PgPool,
        entity: &ResolvedEntity,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let q = sql::select_list(entity, limit, offset.unwrap_or(0));
        Self::query_many(pool, &q).await
    }

    /// Fetch one row by primary key.
    pub async fn read(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: i64,
        include_deleted: bool,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(entity, id, include_deleted);
        Self::query_optional(pool, &q).await
    }

    /// Insert one row. A unique violation resolves to the existing row's key when the
    /// table has a natural key, so repeated ingests of the same record are idempotent.
    pub async fn insert(
        pool: &PgPool,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<InsertOutcome, AppError> {
        let q = sql::insert(entity, body);
        match Self::query_scalar_id(pool, &q).await {
            Ok(id) => Ok(InsertOutcome { id, existing: false }),
            Err(AppError::Db(e)) if is_unique_violation(&e) => {
                if entity.natural_key.is_empty() {
                    return Err(AppError::Conflict(format!("{} already exists", entity.table_name)));
                }
                let values: Vec<Value> = entity
                    .natural_key
                    .iter()
                    .map(|k| body.get(k).cloned().unwrap_or(Value::Null))
                    .collect();
                match Self::find_by_natural_key(pool, entity, &values).await? {
                    Some(id) => {
                        tracing::info!(table = %entity.table_name, id, "duplicate insert resolved to existing row");
                        Ok(InsertOutcome { id, existing: true })
                    }
                    None => Err(AppError::Conflict(e.to_string())),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Primary key of the row with this natural key, deleted or not.
    pub async fn find_by_natural_key(
        pool: &PgPool,
        entity: &ResolvedEntity,
        values: &[Value],
    ) -> Result<Option<i64>, AppError> {
        if entity.natural_key.is_empty() || values.len() != entity.natural_key.len() {
            return Ok(None);
        }
        let q = sql::select_by_natural_key(entity, values);
        log_query(&q);
        let id = bind_all(sqlx::query_scalar::<_, i64>(&q.sql), &q.params)?
            .fetch_optional(pool)
            .await?;
        Ok(id)
    }

    /// Column-selective update of a live row. Returns rows affected; no known columns means 0.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<u64, AppError> {
        let Some(q) = sql::update(entity, id, body) else {
            return Ok(0);
        };
        Self::execute(pool, &q).await
    }

    /// Soft-delete a live row. 404 when the id does not exist; 0 when already deleted.
    pub async fn soft_delete(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<u64, AppError> {
        let n = Self::execute(pool, &sql::soft_delete(entity, id)).await?;
        if n == 0 {
            Self::ensure_exists(pool, entity, id).await?;
        }
        Ok(n)
    }

    /// Reverse a soft delete. 404 when the id does not exist; 0 when the row is already live.
    pub async fn restore(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<u64, AppError> {
        let n = Self::execute(pool, &sql::restore(entity, id)).await?;
        if n == 0 {
            Self::ensure_exists(pool, entity, id).await?;
        }
        Ok(n)
    }

    /// Physically remove a row and return it.
    pub async fn hard_delete(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<Value, AppError> {
        let q = sql::hard_delete(entity, id);
        Self::query_optional(pool, &q)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.table_name, id)))
    }

    /// Rows modified in `(since, now]`, plus the captured `now` as an RFC 3339 cursor.
    pub async fn changes(
        pool: &PgPool,
        entity: &ResolvedEntity,
        since: DateTime<Utc>,
    ) -> Result<(String, Vec<Value>), AppError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()").fetch_one(pool).await?;
        let now = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        let since = since.to_rfc3339_opts(SecondsFormat::Micros, true);
        let q = sql::select_changes(entity, &since, &now);
        let rows = Self::query_many(pool, &q).await?;
        Ok((now, rows))
    }

    async fn ensure_exists(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<(), AppError> {
        let q = sql::exists(entity, id);
        log_query(&q);
        let found: bool = bind_all(sqlx::query_scalar::<_, bool>(&q.sql), &q.params)?
            .fetch_one(pool)
            .await?;
        if found {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("{} {}", entity.table_name, id)))
        }
    }

    async fn query_scalar_id(pool: &PgPool, q: &QueryBuf) -> Result<i64, AppError> {
        log_query(q);
        let id = bind_all(sqlx::query_scalar::<_, i64>(&q.sql), &q.params)?
            .fetch_one(pool)
            .await?;
        Ok(id)
    }

    async fn query_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        log_query(q);
        let row = bind_query(sqlx::query(&q.sql), &q.params)?
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        log_query(q);
        let rows = bind_query(sqlx::query(&q.sql), &q.params)?
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(pool: &PgPool, q: &QueryBuf) -> Result<u64, AppError> {
        log_query(q);
        let result = bind_query(sqlx::query(&q.sql), &q.params)?
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn log_query(q: &QueryBuf) {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
}

fn bind_query<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Result<Query<'q, Postgres, PgArguments>, AppError> {
    for p in params {
        query = query.bind(PgBindValue::from_json(p)?);
    }
    Ok(query)
}

fn bind_all<'q, O>(
    mut query: sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>,
    params: &[Value],
) -> Result<sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>, AppError> {
    for p in params {
        query = query.bind(PgBindValue::from_json(p)?);
    }
    Ok(query)
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

/// Decode one cell. Integer and flag columns arrive as bigint and decimals as float8
/// (see the select list), so only the widened types need probing.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(name) {
        return v
            .map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Micros, true)))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return v
            .map(|d| Value::String(d.and_utc().to_rfc3339_opts(SecondsFormat::Micros, true)))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return v
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

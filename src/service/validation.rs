//! Request validation and coercion driven by the catalog's column types.

use crate::alias::normalize_address;
use crate::config::{ColumnType, EntityKind, ResolvedEntity};
use crate::error::AppError;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub struct RequestValidator;

impl RequestValidator {
    /// Create path: required-field check, coercion, then derived columns.
    pub fn prepare_create(entity: &ResolvedEntity, fields: &mut Map<String, Value>) -> Result<(), AppError> {
        Self::require(entity, fields)?;
        Self::coerce(entity, fields)?;
        Self::derive(entity, fields);
        Ok(())
    }

    /// All required columns must be present and non-blank.
    pub fn require(entity: &ResolvedEntity, fields: &Map<String, Value>) -> Result<(), AppError> {
        let missing: Vec<String> = entity
            .required
            .iter()
            .filter(|col| fields.get(col.as_str()).map(is_blank).unwrap_or(true))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingFields(missing))
        }
    }

    /// Coerce every catalog column present in `fields` (and the primary key) in place.
    /// Unknown keys are left alone.
    pub fn coerce(entity: &ResolvedEntity, fields: &mut Map<String, Value>) -> Result<(), AppError> {
        for (col, v) in fields.iter_mut() {
            let Some(ty) = entity.column_type(col) else { continue };
            let coerced = coerce_value(col, v, ty)?;
            *v = coerced;
        }
        Ok(())
    }

    /// Fill `address_normalized` on buildings when it was not supplied.
    pub fn derive(entity: &ResolvedEntity, fields: &mut Map<String, Value>) {
        if entity.kind != EntityKind::Building {
            return;
        }
        if fields.get("address_normalized").map(is_blank).unwrap_or(true) {
            let addr = normalize_address(
                fields.get("street_address"),
                fields.get("city"),
                fields.get("state"),
                fields.get("zip_code"),
            );
            if !addr.is_empty() {
                fields.insert("address_normalized".into(), Value::String(addr));
            }
        }
    }
}

/// Blank = null, or a string that is empty after trimming.
pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub fn coerce_value(col: &str, v: &Value, ty: ColumnType) -> Result<Value, AppError> {
    if is_blank(v) {
        return Ok(Value::Null);
    }
    match ty {
        ColumnType::Flag => coerce_flag(col, v),
        ColumnType::Int => coerce_int(col, v),
        ColumnType::Decimal => coerce_decimal(col, v),
        ColumnType::Text => coerce_text(col, v),
        ColumnType::StateCode => coerce_state_code(col, v),
        ColumnType::Date => coerce_date(col, v),
        ColumnType::Email => coerce_email(col, v),
    }
}

fn invalid(col: &str, what: &str, v: &Value) -> AppError {
    AppError::Validation(format!("{} must be {}, got {}", col, what, v))
}

fn coerce_flag(col: &str, v: &Value) -> Result<Value, AppError> {
    let flag = match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => return Err(invalid(col, "a yes/no flag", v)),
        },
        _ => return Err(invalid(col, "a yes/no flag", v)),
    };
    Ok(Value::from(i64::from(flag)))
}

/// Integral values within the range of a PostgreSQL `integer` column.
fn coerce_int(col: &str, v: &Value) -> Result<Value, AppError> {
    let n = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    let n = n.ok_or_else(|| invalid(col, "an integer", v))?;
    i32::try_from(n)
        .map(Value::from)
        .map_err(|_| invalid(col, "an integer between -2147483648 and 2147483647", v))
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn coerce_decimal(col: &str, v: &Value) -> Result<Value, AppError> {
    match v {
        Value::Number(_) => Ok(v.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from)
                .ok_or_else(|| invalid(col, "a number", v))
        }
        _ => Err(invalid(col, "a number", v)),
    }
}

fn coerce_text(col: &str, v: &Value) -> Result<Value, AppError> {
    match v {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        _ => Err(invalid(col, "text", v)),
    }
}

fn coerce_state_code(col: &str, v: &Value) -> Result<Value, AppError> {
    let Value::String(s) = v else {
        return Err(invalid(col, "a two-letter state code", v));
    };
    let code = s.trim().to_uppercase();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(Value::String(code))
    } else {
        Err(invalid(col, "a two-letter state code", v))
    }
}

const ISO_DATE_PATTERN: &str = r"^(\d{4}-\d{2}-\d{2})(T([01]\d|2[0-3]):[0-5]\d(:[0-5]\d(\.\d+)?)?Z?)?$";
const US_DATE_PATTERN: &str = r"^\d{1,2}/\d{1,2}/\d{4}$";

static ISO_DATE: OnceLock<Regex> = OnceLock::new();
static US_DATE: OnceLock<Regex> = OnceLock::new();

/// Compile a pattern once; a pattern that fails to compile is an error on every call.
fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> Result<&'static Regex, AppError> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(pattern).map_err(|e| AppError::Validation(format!("invalid pattern {}: {}", pattern, e)))?;
    Ok(cell.get_or_init(|| re))
}

/// Parse `YYYY-MM-DD[THH:MM[:SS[.f]][Z]]` or `mm/dd/yyyy` to a calendar date.
pub fn parse_date(s: &str) -> Result<Option<NaiveDate>, AppError> {
    let s = s.trim();
    if let Some(caps) = compiled(&ISO_DATE, ISO_DATE_PATTERN)?.captures(s) {
        return Ok(NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok());
    }
    if compiled(&US_DATE, US_DATE_PATTERN)?.is_match(s) {
        return Ok(NaiveDate::parse_from_str(s, "%m/%d/%Y").ok());
    }
    Ok(None)
}

fn coerce_date(col: &str, v: &Value) -> Result<Value, AppError> {
    let Value::String(s) = v else {
        return Err(invalid(col, "a date (YYYY-MM-DD or mm/dd/yyyy)", v));
    };
    parse_date(s)?
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| invalid(col, "a date (YYYY-MM-DD or mm/dd/yyyy)", v))
}

fn coerce_email(col: &str, v: &Value) -> Result<Value, AppError> {
    let Value::String(s) = v else {
        return Err(invalid(col, "an email address", v));
    };
    let email = s.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace) =>
        {
            Ok(Value::String(email))
        }
        _ => Err(invalid(col, "an email address", v)),
    }
}

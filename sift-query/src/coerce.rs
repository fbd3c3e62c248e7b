//! Operand coercion.
//!
//! Caller values arrive as JSON. Each is coerced to the storage type of the
//! field it filters before being bound, so that `"50"` compares as a number
//! against a numeric column and dates reach the store in one canonical form.
//! A value that cannot be coerced is a malformed request.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use crate::error::{QueryError, QueryResult};
use crate::filter::FilterValue;
use crate::request::type_name;
use crate::schema::{FieldSpec, StorageType};

/// Canonical date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical timestamp format (UTC, fractional seconds only when present).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_INPUT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Coerce one value to the storage type of `field`.
pub fn scalar(key: &str, field: &FieldSpec, value: &Value) -> QueryResult<FilterValue> {
    let coerced = match (field.storage_type, value) {
        (_, Value::Null) => {
            return Err(QueryError::invalid_value(key, "null is not a valid operand")
                .with_suggestion("Use the `null` or `not_null` predicate to match missing values"));
        }
        (StorageType::String | StorageType::Text, Value::String(s)) => {
            Some(FilterValue::String(s.clone()))
        }
        (StorageType::String | StorageType::Text, Value::Number(n)) => {
            Some(FilterValue::String(n.to_string()))
        }
        (StorageType::Numeric, Value::Number(n)) => number(n),
        (StorageType::Numeric, Value::String(s)) => parse_number(s.trim()),
        (StorageType::Boolean, v) => boolean(v).map(FilterValue::Bool),
        (StorageType::Date, Value::String(s)) => parse_date(s.trim()).map(FilterValue::String),
        (StorageType::DateTime, Value::String(s)) => {
            parse_datetime(s.trim()).map(FilterValue::String)
        }
        _ => None,
    };

    coerced.ok_or_else(|| {
        QueryError::invalid_value(
            key,
            format!("expected {} value, got {}", article(field.storage_type), describe(value)),
        )
    })
}

/// Coerce a predicate flag: `true`/`false`, `"true"`/`"false"`, `"1"`/`"0"`.
pub fn flag(key: &str, value: &Value) -> QueryResult<bool> {
    boolean(value).ok_or_else(|| {
        QueryError::invalid_value(key, format!("expected true or false, got {}", describe(value)))
    })
}

/// Coerce a pattern operand to the string it searches for.
pub fn text(key: &str, value: &Value) -> QueryResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(QueryError::invalid_value(
            key,
            format!("expected a string, got {}", describe(other)),
        )),
    }
}

fn number(n: &Number) -> Option<FilterValue> {
    if let Some(i) = n.as_i64() {
        return Some(FilterValue::Int(i));
    }
    n.as_f64().filter(|f| f.is_finite()).map(FilterValue::Float)
}

fn parse_number(s: &str) -> Option<FilterValue> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(FilterValue::Int(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(FilterValue::Float)
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_datetime(s: &str) -> Option<String> {
    let naive = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            DATETIME_INPUT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.format(DATETIME_FORMAT).to_string())
}

fn article(ty: StorageType) -> &'static str {
    match ty {
        StorageType::String => "a string",
        StorageType::Text => "a text",
        StorageType::Numeric => "a numeric",
        StorageType::Date => "a date (YYYY-MM-DD)",
        StorageType::DateTime => "a datetime (ISO-8601)",
        StorageType::Boolean => "a boolean",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) if s.len() <= 40 => format!("\"{}\"", s),
        Value::String(_) => "a long string".to_string(),
        Value::Number(n) => n.to_string(),
        other => type_name(other).to_string(),
    }
}

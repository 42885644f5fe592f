//! Loose comparison over JSON attribute values
//!
//! Rules compare values that come from different places (principal
//! attributes, resource fields, static rule settings), so `"42"` and `42`
//! must compare equal and date strings must order chronologically. The same
//! comparison is used when a compiled predicate is evaluated in memory, which
//! keeps single-instance checks and bulk filters consistent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::cmp::Ordering;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Format used when date bounds are rendered into filter predicates.
/// Fractional seconds are only written when non-zero.
pub const FILTER_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Numeric view of a value; numeric strings count as numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse a date or date-time string.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.ffffff]`, `YYYY-MM-DDTHH:MM:SS[.ffffff]`
/// and plain `YYYY-MM-DD` (midnight UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Interpret a JSON value as a timestamp (date string or unix seconds).
pub fn to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

/// Unwrap an enum-like value (`{"value": "open", "label": "Open"}`) to its primitive.
pub fn unwrap_enum(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("value").unwrap_or(value),
        _ => value,
    }
}

/// Loose equality between two attribute values.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) if x == y => true,
        (Value::Array(_), _) | (_, Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            a == b
        }
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => match (to_datetime(a), to_datetime(b)) {
                (Some(x), Some(y)) if a.is_string() && b.is_string() => x == y,
                _ => false,
            },
        },
    }
}

/// Loose ordering between two attribute values; `None` when they are not comparable.
pub fn loose_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => match (parse_datetime(x), parse_datetime(y)) {
            (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Membership test using loose equality.
pub fn loose_contains(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|candidate| loose_eq(candidate, needle))
}

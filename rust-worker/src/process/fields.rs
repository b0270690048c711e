//! Schema-tolerant field extraction from decoded JSON objects.
//!
//! Every helper returns `None` when the key is missing or holds an
//! unexpected type. Provider parsers never fail on shape mismatches.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

pub type Object = Map<String, Value>;

/// A non-empty string field. Integer values are rendered in decimal, since
/// some providers send numeric ids.
pub fn string(obj: &Object, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// A JSON number as a decimal.
pub fn number(obj: &Object, key: &str) -> Option<Decimal> {
    match obj.get(key)? {
        Value::Number(n) => decimal_from_number(n),
        _ => None,
    }
}

/// A string holding a decimal number, e.g. `"10.50"`.
pub fn numeric_string(obj: &Object, key: &str) -> Option<Decimal> {
    match obj.get(key)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// A nested object.
pub fn object<'a>(obj: &'a Object, key: &str) -> Option<&'a Object> {
    obj.get(key)?.as_object()
}

/// The first element of a nested array, when it is an object.
pub fn first_object<'a>(obj: &'a Object, key: &str) -> Option<&'a Object> {
    obj.get(key)?.as_array()?.first()?.as_object()
}

/// An RFC 3339 timestamp. Unparsable values are treated as absent.
pub fn timestamp(obj: &Object, key: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn decimal_from_number(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }

    // Go through the shortest textual form so 150.1 stays 150.1 rather than
    // picking up binary float noise.
    Decimal::from_str(&n.to_string())
        .ok()
        .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()))
}

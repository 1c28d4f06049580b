//! Lenient field decoders shared by the export schemas.
//!
//! Upstream exports are produced by a warehouse job that stringifies numbers
//! and nests some structures as JSON-encoded strings, so the schemas coerce
//! rather than insist on the natural JSON type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_date(&value).map_err(D::Error::custom)
}

pub(crate) fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_date(&value).map(Some).map_err(D::Error::custom),
    }
}

pub(crate) fn integer<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_integer(&value).map_err(D::Error::custom)
}

pub(crate) fn optional_integer<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_integer(&value).map(Some).map_err(D::Error::custom),
    }
}

/// Decodes a string field whose contents are themselves JSON.
pub(crate) fn json_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = String::deserialize(deserializer)?;
    serde_json::from_str(&raw).map_err(|err| D::Error::custom(format!("invalid embedded JSON: {err}")))
}

pub(crate) fn optional_json_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| D::Error::custom(format!("invalid embedded JSON: {err}"))),
    }
}

fn coerce_date(value: &Value) -> Result<NaiveDate, String> {
    match value {
        Value::String(raw) => parse_date(raw.trim()),
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|timestamp| timestamp.date_naive())
            .ok_or_else(|| format!("invalid epoch milliseconds {number}")),
        other => Err(format!("expected a date, found {}", describe(other))),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(timestamp.date());
        }
    }
    Err(format!("invalid date '{raw}'"))
}

fn coerce_integer(value: &Value) -> Result<i32, String> {
    let number = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| format!("invalid number {number}"))?,
        Value::String(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("expected a number, found '{raw}'"))?,
        other => return Err(format!("expected a number, found {}", describe(other))),
    };

    if number.fract() != 0.0 || number < i32::MIN as f64 || number > i32::MAX as f64 {
        return Err(format!("expected an integer, found {number}"));
    }
    Ok(number as i32)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

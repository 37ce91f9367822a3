//! Lenient serde helpers for analytics rows
//!
//! ClickHouse and the replay logs disagree on how numbers and timestamps are
//! encoded: prices arrive as JSON numbers or as decimal strings, timestamps as
//! ISO-8601 text, `YYYY-MM-DD HH:MM:SS` text, or integer epochs.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize an f64 from a JSON number or a numeric string
pub fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_f64(&value).map_err(D::Error::custom)
}

/// Optional variant of [`f64_lenient`]; `null` maps to `None`
pub fn opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value_to_f64(&value).map(Some).map_err(D::Error::custom),
    }
}

/// Deserialize an i64 from a JSON number or a numeric string
pub fn i64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("not an integer: {}", n))),
        Value::String(s) => s.trim().parse::<i64>().map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected integer, got {}", other))),
    }
}

/// Epoch milliseconds to UTC
pub fn ms_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = i64_lenient(deserializer)?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}ms", ms)))
}

/// Epoch nanoseconds to UTC
pub fn ns_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let ns = i64_lenient(deserializer)?;
    Ok(DateTime::from_timestamp_nanos(ns))
}

/// Optional epoch nanoseconds to UTC
pub fn opt_ns_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value_to_timestamp(&value, EpochUnit::Nanos)
            .map(Some)
            .map_err(D::Error::custom),
    }
}

/// Any supported timestamp encoding; integers are scaled by magnitude
pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_timestamp(&value, EpochUnit::Auto).map_err(D::Error::custom)
}

/// Optional variant of [`timestamp`]
pub fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value_to_timestamp(&value, EpochUnit::Auto)
            .map(Some)
            .map_err(D::Error::custom),
    }
}

/// Convert a JSON scalar to f64
pub fn value_to_f64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("number out of range: {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number {:?}: {}", s, e)),
        other => Err(format!("expected number, got {}", other)),
    }
}

#[derive(Debug, Clone, Copy)]
enum EpochUnit {
    Nanos,
    Auto,
}

fn value_to_timestamp(value: &Value, unit: EpochUnit) -> Result<DateTime<Utc>, String> {
    match value {
        Value::Number(n) => {
            let raw = n
                .as_i64()
                .ok_or_else(|| format!("timestamp must be an integer: {}", n))?;
            epoch_to_utc(raw, unit)
        }
        Value::String(s) => parse_timestamp_str(s),
        other => Err(format!("expected timestamp, got {}", other)),
    }
}

fn epoch_to_utc(raw: i64, unit: EpochUnit) -> Result<DateTime<Utc>, String> {
    let abs = raw.unsigned_abs();
    let parsed = match unit {
        EpochUnit::Nanos => Some(DateTime::from_timestamp_nanos(raw)),
        EpochUnit::Auto if abs >= 100_000_000_000_000_000 => {
            Some(DateTime::from_timestamp_nanos(raw))
        }
        EpochUnit::Auto if abs >= 100_000_000_000_000 => DateTime::from_timestamp_micros(raw),
        EpochUnit::Auto if abs >= 100_000_000_000 => DateTime::from_timestamp_millis(raw),
        EpochUnit::Auto => DateTime::from_timestamp(raw, 0),
    };
    parsed.ok_or_else(|| format!("timestamp out of range: {}", raw))
}

/// Parse RFC 3339 or a naive `YYYY-MM-DD HH:MM:SS[.fff]` string taken as UTC
pub fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(raw) = s.parse::<i64>() {
        return epoch_to_utc(raw, EpochUnit::Auto);
    }
    Err(format!("unrecognised timestamp {:?}", s))
}

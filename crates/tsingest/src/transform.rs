// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value transforms applied by mappings.
//!
//! Transforms turn the raw string of a record column into the typed value a
//! mapping emits. Returning `None` means "no value", which the mapper treats
//! exactly like a missing column.
//!
//! Named transforms make mapping sets expressible in YAML job files:
//!
//! | kind      | names                                               |
//! |-----------|-----------------------------------------------------|
//! | timestamp | `epoch_ms`, `epoch_s`, `rfc3339`, `format:<strftime>` |
//! | tag       | `identity`, `lowercase`, `uppercase`, `trim`        |
//! | field     | `float`, `integer`, `boolean`, `string`             |

use crate::error::ConfigError;
use crate::point::FieldValue;
use chrono::{DateTime, NaiveDateTime};
use std::sync::Arc;

/// Raw string to milliseconds since the Unix epoch.
pub type TimestampTransform = Arc<dyn Fn(&str) -> Option<i64> + Send + Sync>;

/// Raw string to tag value.
pub type TagTransform = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Raw string to field value.
pub type FieldTransform = Arc<dyn Fn(&str) -> Option<FieldValue> + Send + Sync>;

/// Parse an integer count of milliseconds.
pub fn epoch_ms(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Parse seconds since the epoch, fractional part allowed (`1700000000.250`).
pub fn epoch_s(value: &str) -> Option<i64> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    Some((secs * 1000.0).round() as i64)
}

/// Parse an RFC 3339 / ISO 8601 timestamp with offset.
pub fn rfc3339(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Build a transform parsing a naive timestamp with a strftime pattern,
/// interpreted as UTC.
pub fn with_format(pattern: impl Into<String>) -> TimestampTransform {
    let pattern = pattern.into();
    Arc::new(move |value: &str| {
        NaiveDateTime::parse_from_str(value.trim(), &pattern)
            .ok()
            .map(|dt| dt.and_utc().timestamp_millis())
    })
}

pub fn parse_float(value: &str) -> Option<FieldValue> {
    let v: f64 = value.trim().parse().ok()?;
    v.is_finite().then_some(FieldValue::Float(v))
}

pub fn parse_integer(value: &str) -> Option<FieldValue> {
    value.trim().parse::<i64>().ok().map(FieldValue::Integer)
}

/// Accepts `true`/`false`, `t`/`f`, `yes`/`no`, `1`/`0` (case-insensitive).
pub fn parse_boolean(value: &str) -> Option<FieldValue> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(FieldValue::Boolean(true)),
        "false" | "f" | "no" | "n" | "0" => Some(FieldValue::Boolean(false)),
        _ => None,
    }
}

pub fn as_string(value: &str) -> Option<FieldValue> {
    Some(FieldValue::String(value.to_string()))
}

/// Resolve a named timestamp transform.
pub fn timestamp_by_name(name: &str) -> Result<TimestampTransform, ConfigError> {
    if let Some(pattern) = name.strip_prefix("format:") {
        return Ok(with_format(pattern));
    }
    let transform: TimestampTransform = match name {
        "epoch_ms" => Arc::new(epoch_ms),
        "epoch_s" => Arc::new(epoch_s),
        "rfc3339" | "iso8601" => Arc::new(rfc3339),
        other => {
            return Err(ConfigError::UnknownTransform {
                kind: "timestamp",
                name: other.to_string(),
            })
        }
    };
    Ok(transform)
}

/// Resolve a named tag transform. `identity` is the same as no transform.
pub fn tag_by_name(name: &str) -> Result<Option<TagTransform>, ConfigError> {
    let transform: TagTransform = match name {
        "identity" => return Ok(None),
        "lowercase" => Arc::new(|v: &str| Some(v.to_lowercase())),
        "uppercase" => Arc::new(|v: &str| Some(v.to_uppercase())),
        "trim" => Arc::new(|v: &str| Some(v.trim().to_string())),
        other => {
            return Err(ConfigError::UnknownTransform {
                kind: "tag",
                name: other.to_string(),
            })
        }
    };
    Ok(Some(transform))
}

/// Resolve a named field transform.
pub fn field_by_name(name: &str) -> Result<FieldTransform, ConfigError> {
    let transform: FieldTransform = match name {
        "float" => Arc::new(parse_float),
        "integer" => Arc::new(parse_integer),
        "boolean" => Arc::new(parse_boolean),
        "string" => Arc::new(as_string),
        other => {
            return Err(ConfigError::UnknownTransform {
                kind: "field",
                name: other.to_string(),
            })
        }
    };
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_parsers() {
        assert_eq!(epoch_ms("1000"), Some(1000));
        assert_eq!(epoch_ms(" 42 "), Some(42));
        assert_eq!(epoch_ms("1.5"), None);
        assert_eq!(epoch_s("1700000000.25"), Some(1_700_000_000_250));
        assert_eq!(epoch_s("nope"), None);
    }

    #[test]
    fn test_rfc3339_with_offset() {
        assert_eq!(rfc3339("1970-01-01T00:00:01.500Z"), Some(1500));
        assert_eq!(rfc3339("1970-01-01T01:00:00+01:00"), Some(0));
        assert_eq!(rfc3339("yesterday"), None);
    }

    #[test]
    fn test_named_format_transform() {
        let transform = timestamp_by_name("format:%Y-%m-%d %H:%M:%S").expect("format");
        assert_eq!(transform("1970-01-01 00:00:02"), Some(2000));
        assert_eq!(transform("01/01/1970"), None);
    }

    #[test]
    fn test_field_parsers() {
        assert_eq!(parse_float("3.15"), Some(FieldValue::Float(3.15)));
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_integer("-7"), Some(FieldValue::Integer(-7)));
        assert_eq!(parse_boolean("Yes"), Some(FieldValue::Boolean(true)));
        assert_eq!(parse_boolean("0"), Some(FieldValue::Boolean(false)));
        assert_eq!(parse_boolean("maybe"), None);
    }

    #[test]
    fn test_tag_transforms() {
        assert!(tag_by_name("identity").expect("identity").is_none());
        let lower = tag_by_name("lowercase").expect("lowercase").expect("some");
        assert_eq!(lower("WEB-1"), Some("web-1".to_string()));
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(matches!(
            timestamp_by_name("julian"),
            Err(ConfigError::UnknownTransform { kind: "timestamp", .. })
        ));
        assert!(tag_by_name("reverse").is_err());
        assert!(field_by_name("decimal").is_err());
    }
}

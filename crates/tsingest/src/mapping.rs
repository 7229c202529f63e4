// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative record-to-point mapping.
//!
//! A mapping set names which record columns become the point's timestamp,
//! its tags and its fields. [`compile`] validates the set once and returns a
//! [`PointMapper`], a pure function from [`Record`] to `Option<Point>`.
//!
//! ```text
//! Record { t: "1000", host: "web-1", v: "3.5" }
//!   timestamp(from: t, epoch_ms)
//!   tag(from: host, to: server)
//!   field(from: v, float)
//! --> Point { timestamp: 1000, tags: { server: web-1 }, fields: { v: 3.5 } }
//! ```
//!
//! A point is all-or-nothing: if any declared tag or field cannot be
//! resolved, the record is rejected and `map` returns `None`.

use crate::error::ConfigError;
use crate::point::{FieldValue, Point};
use crate::record::Record;
use crate::transform::{FieldTransform, TagTransform, TimestampTransform};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Sources the point's time coordinate.
#[derive(Clone)]
pub struct TimestampMapping {
    /// Column to read.
    pub from: String,
    /// Used when the column is missing or empty.
    pub default: Option<String>,
    /// Raw string to epoch milliseconds. Required.
    pub transform: Option<TimestampTransform>,
}

impl TimestampMapping {
    pub fn new<F>(from: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> Option<i64> + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            default: None,
            transform: Some(Arc::new(transform)),
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Sources one tag of the point.
#[derive(Clone)]
pub struct TagMapping {
    pub from: String,
    /// Tag key to write instead of `from`.
    pub to: Option<String>,
    pub default: Option<String>,
    /// Optional; the raw string is used as-is when absent.
    pub transform: Option<TagTransform>,
}

impl TagMapping {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: None,
            default: None,
            transform: None,
        }
    }

    pub fn to(mut self, key: impl Into<String>) -> Self {
        self.to = Some(key.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

/// Sources one field of the point.
#[derive(Clone)]
pub struct FieldMapping {
    pub from: String,
    /// Field key to write instead of `from`.
    pub to: Option<String>,
    pub default: Option<String>,
    /// Raw string to typed value. Required.
    pub transform: Option<FieldTransform>,
}

impl FieldMapping {
    pub fn new<F>(from: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> Option<FieldValue> + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: None,
            default: None,
            transform: Some(Arc::new(transform)),
        }
    }

    pub fn to(mut self, key: impl Into<String>) -> Self {
        self.to = Some(key.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// One entry of a mapping set.
#[derive(Clone, Debug)]
pub enum Mapping {
    Timestamp(TimestampMapping),
    Tag(TagMapping),
    Field(FieldMapping),
}

impl Mapping {
    /// The record column this mapping reads.
    pub fn source_column(&self) -> &str {
        match self {
            Mapping::Timestamp(m) => &m.from,
            Mapping::Tag(m) => &m.from,
            Mapping::Field(m) => &m.from,
        }
    }
}

impl From<TimestampMapping> for Mapping {
    fn from(m: TimestampMapping) -> Self {
        Mapping::Timestamp(m)
    }
}

impl From<TagMapping> for Mapping {
    fn from(m: TagMapping) -> Self {
        Mapping::Tag(m)
    }
}

impl From<FieldMapping> for Mapping {
    fn from(m: FieldMapping) -> Self {
        Mapping::Field(m)
    }
}

fn debug_mapping(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    from: &str,
    to: Option<&str>,
    default: Option<&str>,
    has_transform: bool,
) -> fmt::Result {
    f.debug_struct(name)
        .field("from", &from)
        .field("to", &to)
        .field("default", &default)
        .field("transform", &has_transform)
        .finish()
}

impl fmt::Debug for TimestampMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_mapping(
            f,
            "TimestampMapping",
            &self.from,
            None,
            self.default.as_deref(),
            self.transform.is_some(),
        )
    }
}

impl fmt::Debug for TagMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_mapping(
            f,
            "TagMapping",
            &self.from,
            self.to.as_deref(),
            self.default.as_deref(),
            self.transform.is_some(),
        )
    }
}

impl fmt::Debug for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_mapping(
            f,
            "FieldMapping",
            &self.from,
            self.to.as_deref(),
            self.default.as_deref(),
            self.transform.is_some(),
        )
    }
}

struct CompiledTimestamp {
    from: String,
    default: Option<String>,
    transform: TimestampTransform,
}

struct CompiledTag {
    from: String,
    key: String,
    default: Option<String>,
    transform: Option<TagTransform>,
}

struct CompiledField {
    from: String,
    key: String,
    default: Option<String>,
    transform: FieldTransform,
}

struct MapperInner {
    measurement: String,
    timestamp: CompiledTimestamp,
    tags: Vec<CompiledTag>,
    fields: Vec<CompiledField>,
    columns: Vec<String>,
}

/// Compiled mapping set. Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct PointMapper {
    inner: Arc<MapperInner>,
}

impl fmt::Debug for PointMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointMapper")
            .field("measurement", &self.inner.measurement)
            .field("timestamp", &self.inner.timestamp.from)
            .field("tags", &self.inner.tags.len())
            .field("fields", &self.inner.fields.len())
            .finish()
    }
}

/// Validate a mapping set and build the mapper for `measurement`.
///
/// Fails when the set has zero or several timestamp mappings, or when the
/// timestamp mapping or a field mapping has no transform.
pub fn compile(
    measurement: impl Into<String>,
    mappings: &[Mapping],
) -> Result<PointMapper, ConfigError> {
    let mut timestamp: Option<CompiledTimestamp> = None;
    let mut tags = Vec::new();
    let mut fields = Vec::new();
    let mut columns: Vec<String> = Vec::new();

    for mapping in mappings {
        match mapping {
            Mapping::Timestamp(m) => {
                if let Some(existing) = &timestamp {
                    return Err(ConfigError::DuplicateTimestamp {
                        first: existing.from.clone(),
                        second: m.from.clone(),
                    });
                }
                let transform = m.transform.clone().ok_or_else(|| {
                    ConfigError::MissingTimestampTransform {
                        from: m.from.clone(),
                    }
                })?;
                timestamp = Some(CompiledTimestamp {
                    from: m.from.clone(),
                    default: m.default.clone(),
                    transform,
                });
            }
            Mapping::Tag(m) => tags.push(CompiledTag {
                from: m.from.clone(),
                key: m.to.clone().unwrap_or_else(|| m.from.clone()),
                default: m.default.clone(),
                transform: m.transform.clone(),
            }),
            Mapping::Field(m) => {
                let transform =
                    m.transform
                        .clone()
                        .ok_or_else(|| ConfigError::MissingFieldTransform {
                            from: m.from.clone(),
                        })?;
                fields.push(CompiledField {
                    from: m.from.clone(),
                    key: m.to.clone().unwrap_or_else(|| m.from.clone()),
                    default: m.default.clone(),
                    transform,
                });
            }
        }

        if !columns.iter().any(|c| c == mapping.source_column()) {
            columns.push(mapping.source_column().to_string());
        }
    }

    let timestamp = timestamp.ok_or(ConfigError::MissingTimestamp)?;
    // A point without fields cannot be encoded as Line Protocol.
    if fields.is_empty() {
        return Err(ConfigError::MissingField);
    }

    Ok(PointMapper {
        inner: Arc::new(MapperInner {
            measurement: measurement.into(),
            timestamp,
            tags,
            fields,
            columns,
        }),
    })
}

/// Column value if present and non-empty, else the non-empty default.
fn resolve<'a>(record: &'a Record, from: &str, default: Option<&'a str>) -> Option<&'a str> {
    record
        .get(from)
        .filter(|v| !v.is_empty())
        .or(default)
        .filter(|v| !v.is_empty())
}

impl PointMapper {
    pub fn measurement(&self) -> &str {
        &self.inner.measurement
    }

    /// Distinct source columns in declaration order. Used as the search
    /// projection.
    pub fn columns(&self) -> &[String] {
        &self.inner.columns
    }

    /// Map one record to a point, or `None` when the record is rejected.
    pub fn map(&self, record: &Record) -> Option<Point> {
        let inner = &*self.inner;

        let ts = &inner.timestamp;
        let raw = resolve(record, &ts.from, ts.default.as_deref())?;
        let timestamp = (ts.transform)(raw)?;

        let mut tags = BTreeMap::new();
        for tag in &inner.tags {
            let Some(raw) = resolve(record, &tag.from, tag.default.as_deref()) else {
                continue;
            };
            let value = match &tag.transform {
                Some(transform) => transform(raw),
                None => Some(raw.to_string()),
            };
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                tags.insert(tag.key.clone(), value);
            }
        }

        if tags.len() < inner.tags.len() {
            tracing::trace!(
                measurement = %inner.measurement,
                "record rejected: {} of {} tags resolved",
                tags.len(),
                inner.tags.len()
            );
            return None;
        }

        let mut fields = BTreeMap::new();
        for field in &inner.fields {
            let Some(raw) = resolve(record, &field.from, field.default.as_deref()) else {
                continue;
            };
            match (field.transform)(raw) {
                Some(FieldValue::String(s)) if s.is_empty() => {}
                Some(value) => {
                    fields.insert(field.key.clone(), value);
                }
                None => {}
            }
        }

        if fields.len() < inner.fields.len() {
            tracing::trace!(
                measurement = %inner.measurement,
                "record rejected: {} of {} fields resolved",
                fields.len(),
                inner.fields.len()
            );
            return None;
        }

        Some(Point {
            measurement: inner.measurement.clone(),
            timestamp,
            tags,
            fields,
        })
    }
}

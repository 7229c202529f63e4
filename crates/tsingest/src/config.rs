// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML job files.
//!
//! A job file names the store, optionally the search engine, the sink
//! tuning, and exactly one job: a CSV file, a historic sweep or a realtime
//! search.

use crate::error::ConfigError;
use crate::ingest::file::{split_on, FileQuery};
use crate::ingest::historic::HistoricQuery;
use crate::ingest::realtime::RealtimeQuery;
use crate::mapping::{self, FieldMapping, Mapping, TagMapping, TimestampMapping};
use crate::transform;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level job file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub influxdb: InfluxDbConfig,
    #[serde(default)]
    pub splunk: Option<SplunkConfig>,
    #[serde(default)]
    pub sink: SinkConfig,
    pub job: JobConfig,
}

/// InfluxDB 1.x connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConfig {
    #[serde(default = "default_influx_host")]
    pub host: String,
    #[serde(default = "default_influx_port")]
    pub port: u16,
    /// `http` or `https`.
    #[serde(default = "default_influx_protocol")]
    pub protocol: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl InfluxDbConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Splunk management API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SplunkConfig {
    #[serde(default = "default_splunk_host")]
    pub host: String,
    #[serde(default = "default_splunk_port")]
    pub port: u16,
    #[serde(default = "default_splunk_scheme")]
    pub scheme: String,
    pub username: String,
    pub password: String,
    /// Set to false for self-signed management certificates.
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

impl SplunkConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Batching and liveness tuning for the sink.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Buffered points beyond which a flush is triggered.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Period of the background flush.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// How long the startup ping may take.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
}

impl SinkConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
        }
    }
}

/// The job to run.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobConfig {
    Csv(CsvJob),
    Historic(HistoricJob),
    Realtime(RealtimeJob),
}

impl JobConfig {
    pub fn measurement(&self) -> &str {
        match self {
            JobConfig::Csv(j) => &j.measurement,
            JobConfig::Historic(j) => &j.measurement,
            JobConfig::Realtime(j) => &j.measurement,
        }
    }

    pub fn mappings(&self) -> &[MappingConfig] {
        match self {
            JobConfig::Csv(j) => &j.mappings,
            JobConfig::Historic(j) => &j.mappings,
            JobConfig::Realtime(j) => &j.mappings,
        }
    }

    /// Whether the job reads from the search engine.
    pub fn needs_search(&self) -> bool {
        !matches!(self, JobConfig::Csv(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvJob {
    pub measurement: String,
    pub mappings: Vec<MappingConfig>,
    pub file: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl CsvJob {
    pub fn to_query(&self) -> Result<FileQuery, ConfigError> {
        Ok(FileQuery {
            path: self.file.clone(),
            measurement: self.measurement.clone(),
            mappings: build_mappings(&self.mappings)?,
            parse_line: split_on(self.delimiter),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoricJob {
    pub measurement: String,
    pub mappings: Vec<MappingConfig>,
    pub query: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Window length, e.g. `15m`.
    pub step: String,
    /// Rows per result page.
    pub page_size: Option<u64>,
}

impl HistoricJob {
    pub fn step(&self) -> Result<TimeDelta, ConfigError> {
        match parse_step(&self.step) {
            Some(step) if step > TimeDelta::zero() => Ok(step),
            _ => Err(ConfigError::Invalid(format!(
                "step must be a positive duration such as 30s, 15m, 1h or 1d, got {:?}",
                self.step
            ))),
        }
    }

    pub fn to_query(&self) -> Result<HistoricQuery, ConfigError> {
        Ok(HistoricQuery {
            query: self.query.clone(),
            measurement: self.measurement.clone(),
            mappings: build_mappings(&self.mappings)?,
            from: self.from,
            to: self.to,
            step: self.step()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeJob {
    pub measurement: String,
    pub mappings: Vec<MappingConfig>,
    pub query: String,
    pub poll_interval_ms: Option<u64>,
}

impl RealtimeJob {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    pub fn to_query(&self) -> Result<RealtimeQuery, ConfigError> {
        Ok(RealtimeQuery {
            query: self.query.clone(),
            measurement: self.measurement.clone(),
            mappings: build_mappings(&self.mappings)?,
        })
    }
}

/// One mapping as written in a job file. Transforms are referenced by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingConfig {
    Timestamp {
        from: String,
        default: Option<String>,
        transform: Option<String>,
    },
    Tag {
        from: String,
        to: Option<String>,
        default: Option<String>,
        transform: Option<String>,
    },
    Field {
        from: String,
        to: Option<String>,
        default: Option<String>,
        transform: Option<String>,
    },
}

impl MappingConfig {
    /// Resolve transform names into a [`Mapping`].
    pub fn build(&self) -> Result<Mapping, ConfigError> {
        let mapping = match self {
            MappingConfig::Timestamp {
                from,
                default,
                transform,
            } => {
                let name = transform
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingTimestampTransform { from: from.clone() })?;
                Mapping::Timestamp(TimestampMapping {
                    from: from.clone(),
                    default: default.clone(),
                    transform: Some(transform::timestamp_by_name(name)?),
                })
            }
            MappingConfig::Tag {
                from,
                to,
                default,
                transform,
            } => Mapping::Tag(TagMapping {
                from: from.clone(),
                to: to.clone(),
                default: default.clone(),
                transform: match transform {
                    Some(name) => transform::tag_by_name(name)?,
                    None => None,
                },
            }),
            MappingConfig::Field {
                from,
                to,
                default,
                transform,
            } => {
                let name = transform
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingFieldTransform { from: from.clone() })?;
                Mapping::Field(FieldMapping {
                    from: from.clone(),
                    to: to.clone(),
                    default: default.clone(),
                    transform: Some(transform::field_by_name(name)?),
                })
            }
        };
        Ok(mapping)
    }
}

/// Build every mapping of a job.
pub fn build_mappings(configs: &[MappingConfig]) -> Result<Vec<Mapping>, ConfigError> {
    configs.iter().map(MappingConfig::build).collect()
}

impl JobFile {
    /// Parse and validate a job file from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: JobFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Parse and validate a job file from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.influxdb.database.trim().is_empty() {
            return invalid("influxdb.database must not be empty");
        }
        if self.sink.max_batch_size == 0 {
            return invalid("sink.max_batch_size must be at least 1");
        }
        if self.sink.flush_interval_ms == 0 {
            return invalid("sink.flush_interval_ms must be at least 1");
        }
        if self.job.measurement().trim().is_empty() {
            return invalid("job.measurement must not be empty");
        }
        if self.job.needs_search() && self.splunk.is_none() {
            return invalid("a splunk section is required for historic and realtime jobs");
        }

        match &self.job {
            JobConfig::Csv(_) => {}
            JobConfig::Historic(job) => {
                job.step()?;
                if job.to <= job.from {
                    return invalid("job.to must be after job.from");
                }
                if job.page_size == Some(0) {
                    return invalid("job.page_size must be at least 1");
                }
            }
            JobConfig::Realtime(job) => {
                if job.poll_interval_ms == Some(0) {
                    return invalid("job.poll_interval_ms must be at least 1");
                }
            }
        }

        // Surface mapping errors before connecting anything.
        let mappings = build_mappings(self.job.mappings())?;
        mapping::compile(self.job.measurement(), &mappings)?;
        Ok(())
    }
}

/// Parse a step such as `500ms`, `30s`, `15m`, `1h`, `1d` or `1w`.
///
/// A bare number is read as seconds.
pub fn parse_step(s: &str) -> Option<TimeDelta> {
    let s = s.trim().to_lowercase();

    if let Some(num) = s.strip_suffix("ms") {
        num.trim().parse::<i64>().ok().and_then(TimeDelta::try_milliseconds)
    } else if let Some(num) = s.strip_suffix('s') {
        num.trim().parse::<i64>().ok().and_then(TimeDelta::try_seconds)
    } else if let Some(num) = s.strip_suffix('m') {
        num.trim().parse::<i64>().ok().and_then(TimeDelta::try_minutes)
    } else if let Some(num) = s.strip_suffix('h') {
        num.trim().parse::<i64>().ok().and_then(TimeDelta::try_hours)
    } else if let Some(num) = s.strip_suffix('d') {
        num.trim().parse::<i64>().ok().and_then(TimeDelta::try_days)
    } else if let Some(num) = s.strip_suffix('w') {
        num.trim().parse::<i64>().ok().and_then(TimeDelta::try_weeks)
    } else {
        s.parse::<i64>().ok().and_then(TimeDelta::try_seconds)
    }
}

fn default_influx_host() -> String {
    "localhost".to_string()
}

fn default_influx_port() -> u16 {
    8086
}

fn default_influx_protocol() -> String {
    "http".to_string()
}

fn default_splunk_host() -> String {
    "localhost".to_string()
}

fn default_splunk_port() -> u16 {
    8089
}

fn default_splunk_scheme() -> String {
    "https".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_batch_size() -> usize {
    crate::buffer::DEFAULT_MAX_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_ping_timeout_ms() -> u64 {
    5000
}

fn default_delimiter() -> char {
    ','
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::FieldValue;
    use crate::record::Record;

    const CSV_YAML: &str = r#"
influxdb:
  database: "metrics"
job:
  kind: csv
  measurement: "requests"
  file: "/var/data/requests.csv"
  mappings:
    - { type: timestamp, from: time, transform: epoch_ms }
    - { type: tag, from: host, to: server, transform: lowercase }
    - { type: field, from: elapsed, transform: float, default: "0" }
"#;

    const HISTORIC_YAML: &str = r#"
influxdb:
  host: "influx.example.com"
  port: 8087
  protocol: "https"
  username: "writer"
  password: "secret"
  database: "splunk"
splunk:
  host: "splunk.example.com"
  username: "admin"
  password: "changeme"
  verify_tls: false
sink:
  max_batch_size: 5000
  flush_interval_ms: 2000
job:
  kind: historic
  measurement: "errors"
  query: "index=web status>=500"
  from: "2024-01-01T00:00:00Z"
  to: "2024-01-02T00:00:00Z"
  step: "1h"
  mappings:
    - { type: timestamp, from: _time, transform: rfc3339 }
    - { type: field, from: count, transform: integer }
"#;

    #[test]
    fn test_parse_csv_job_with_defaults() {
        let file = JobFile::from_yaml(CSV_YAML).expect("parse");

        assert_eq!(file.influxdb.base_url(), "http://localhost:8086");
        assert!(file.influxdb.username.is_none());
        assert!(file.splunk.is_none());
        assert_eq!(file.sink.max_batch_size, 10_000);
        assert_eq!(file.sink.flush_interval(), Duration::from_millis(1000));
        assert_eq!(file.sink.ping_timeout(), Duration::from_secs(5));

        let JobConfig::Csv(job) = &file.job else {
            panic!("expected csv job");
        };
        assert_eq!(job.delimiter, ',');

        let query = job.to_query().expect("query");
        assert_eq!((query.parse_line)("a,b"), vec!["a", "b"]);

        let mapper = mapping::compile(&query.measurement, &query.mappings).expect("compile");
        let point = mapper
            .map(
                &Record::new()
                    .with("time", "1000")
                    .with("host", "WEB-1")
                    .with("elapsed", ""),
            )
            .expect("point");
        assert_eq!(point.tags.get("server").map(String::as_str), Some("web-1"));
        assert_eq!(point.fields.get("elapsed"), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn test_parse_historic_job() {
        let file = JobFile::from_yaml(HISTORIC_YAML).expect("parse");

        assert_eq!(file.influxdb.base_url(), "https://influx.example.com:8087");
        let splunk = file.splunk.as_ref().expect("splunk");
        assert_eq!(splunk.base_url(), "https://splunk.example.com:8089");
        assert!(!splunk.verify_tls);
        assert_eq!(file.sink.max_batch_size, 5000);

        let JobConfig::Historic(job) = &file.job else {
            panic!("expected historic job");
        };
        let query = job.to_query().expect("query");
        assert_eq!(query.step, TimeDelta::hours(1));
        assert_eq!(query.to - query.from, TimeDelta::days(1));
    }

    #[test]
    fn test_historic_requires_splunk_section() {
        let yaml = HISTORIC_YAML.replace("splunk:\n", "unused:\n");
        let err = JobFile::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_step_and_range() {
        let zero = HISTORIC_YAML.replace("step: \"1h\"", "step: \"0s\"");
        assert!(matches!(JobFile::from_yaml(&zero), Err(ConfigError::Invalid(_))));

        let garbage = HISTORIC_YAML.replace("step: \"1h\"", "step: \"soon\"");
        assert!(matches!(JobFile::from_yaml(&garbage), Err(ConfigError::Invalid(_))));

        let backwards = HISTORIC_YAML.replace("2024-01-02T00:00:00Z", "2023-12-31T00:00:00Z");
        assert!(matches!(JobFile::from_yaml(&backwards), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_mapping_errors() {
        let no_transform = CSV_YAML.replace(", transform: float", "");
        assert!(matches!(
            JobFile::from_yaml(&no_transform),
            Err(ConfigError::MissingFieldTransform { .. })
        ));

        let no_fields = CSV_YAML.replace(
            "    - { type: field, from: elapsed, transform: float, default: \"0\" }\n",
            "",
        );
        assert!(matches!(
            JobFile::from_yaml(&no_fields),
            Err(ConfigError::MissingField)
        ));

        let unknown = CSV_YAML.replace("transform: epoch_ms", "transform: julian");
        assert!(matches!(
            JobFile::from_yaml(&unknown),
            Err(ConfigError::UnknownTransform { kind: "timestamp", .. })
        ));
    }

    #[test]
    fn test_rejects_empty_measurement() {
        let yaml = CSV_YAML.replace("measurement: \"requests\"", "measurement: \"\"");
        assert!(matches!(JobFile::from_yaml(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_step() {
        assert_eq!(parse_step("500ms"), Some(TimeDelta::milliseconds(500)));
        assert_eq!(parse_step("30s"), Some(TimeDelta::seconds(30)));
        assert_eq!(parse_step("15m"), Some(TimeDelta::minutes(15)));
        assert_eq!(parse_step("1H"), Some(TimeDelta::hours(1)));
        assert_eq!(parse_step("1d"), Some(TimeDelta::days(1)));
        assert_eq!(parse_step("2w"), Some(TimeDelta::weeks(2)));
        assert_eq!(parse_step("90"), Some(TimeDelta::seconds(90)));
        assert_eq!(parse_step("fast"), None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("job.yaml");
        std::fs::write(&path, CSV_YAML).expect("write");

        let file = JobFile::from_file(&path).expect("parse");
        assert_eq!(file.job.measurement(), "requests");

        assert!(matches!(
            JobFile::from_file(&dir.path().join("missing.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}

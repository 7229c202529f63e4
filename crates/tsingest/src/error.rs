// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the ingestion pipeline.
//!
//! Record rejection is not an error: the mapper returns `None` and the
//! record is dropped silently.

use std::time::Duration;
use thiserror::Error;

/// Invalid mapping set or job configuration. Fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot specify multiple timestamp mappings (`{first}` and `{second}`)")]
    DuplicateTimestamp { first: String, second: String },

    #[error("mapping set has no timestamp mapping")]
    MissingTimestamp,

    #[error("mapping set has no field mapping")]
    MissingField,

    #[error("timestamp mapping `{from}` must include a transform")]
    MissingTimestampTransform { from: String },

    #[error("field mapping `{from}` must include a transform")]
    MissingFieldTransform { from: String },

    #[error("unknown {kind} transform: {name}")]
    UnknownTransform { kind: &'static str, name: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store ping or search login failure. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("store ping failed: {0}")]
    Ping(String),

    #[error("store did not answer ping within {0:?}")]
    PingTimeout(Duration),

    #[error("search login failed: {0}")]
    Login(String),
}

/// Search submission or result fetch failure. Aborts the run.
#[derive(Debug, Error)]
pub enum SourceQueryError {
    #[error("search submission failed: {0}")]
    Submit(String),

    #[error("fetching results at offset {offset} failed: {message}")]
    Fetch { offset: u64, message: String },

    #[error("fetching preview results failed: {0}")]
    Preview(String),

    #[error("cancelling search job failed: {0}")]
    Cancel(String),

    #[error("unexpected search response: {0}")]
    Protocol(String),
}

/// Write failure during a flush. Logged by the sink and swallowed.
#[derive(Debug, Error)]
pub enum SinkWriteError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("store rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    SourceQuery(#[from] SourceQueryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

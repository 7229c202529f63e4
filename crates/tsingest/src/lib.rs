// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tsingest -- time-series ingestion into InfluxDB
//!
//! Moves rows from delimited files and Splunk searches into an InfluxDB 1.x
//! database as Line Protocol points.
//!
//! # Architecture
//!
//! ```text
//! FileIngester / HistoricIngester / RealtimeIngester
//! +-- SearchDriver<S: SearchService>  (windows, pages, realtime polls)
//! +-- PointMapper                     (Record -> Option<Point>)
//! +-- BatchedSink<W: PointWriter>     (size/timer flushes, fire-and-forget)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tsingest::{compile, BatchedSink, FieldMapping, SinkConfig, TimestampMapping};
//! use tsingest::clients::InfluxHttpWriter;
//! use tsingest::transform;
//!
//! let mapper = compile("requests", &[
//!     TimestampMapping::new("time", transform::epoch_ms).into(),
//!     FieldMapping::new("elapsed", transform::parse_float).into(),
//! ])?;
//!
//! let writer = InfluxHttpWriter::new(&influx_config)?;
//! let sink = BatchedSink::connect(writer, &SinkConfig::default()).await?;
//! sink.write_one(mapper.map(&record));
//! sink.flush_and_wait().await;
//! ```

pub mod buffer;
pub mod clients;
pub mod config;
pub mod error;
pub mod ingest;
pub mod mapping;
pub mod mock;
pub mod point;
pub mod record;
pub mod sink;
pub mod source;
pub mod transform;

pub use buffer::BatchBuffer;
pub use config::{JobConfig, JobFile, MappingConfig, SinkConfig};
pub use error::{
    ConfigError, ConnectivityError, IngestError, Result, SinkWriteError, SourceQueryError,
};
pub use ingest::{
    FileIngester, FileProgress, FileQuery, HistoricIngester, HistoricProgress, HistoricQuery,
    RealtimeIngester, RealtimeProgress, RealtimeQuery,
};
pub use mapping::{compile, FieldMapping, Mapping, PointMapper, TagMapping, TimestampMapping};
pub use mock::{MockSearch, MockWriter};
pub use point::{FieldValue, Point};
pub use record::Record;
pub use sink::{BatchedSink, PointWriter, SinkStats};
pub use source::{Page, ResultSet, SearchDriver, SearchService, Window};

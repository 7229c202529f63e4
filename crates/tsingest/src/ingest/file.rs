// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delimited text file ingestion.

use super::Progress;
use crate::error::Result;
use crate::mapping::{self, Mapping, PointMapper};
use crate::record::Record;
use crate::sink::{BatchedSink, PointWriter};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::info;

/// Mapped points between two progress events.
pub const PROGRESS_EVERY: u64 = 10_000;

/// Splits one line into cell values.
pub type LineParser = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Plain split on a single delimiter. No quoting support.
pub fn split_on(delimiter: char) -> LineParser {
    Arc::new(move |line: &str| line.split(delimiter).map(str::to_string).collect())
}

/// A file to ingest.
#[derive(Clone)]
pub struct FileQuery {
    pub path: PathBuf,
    pub measurement: String,
    pub mappings: Vec<Mapping>,
    /// Applied to the header line and to every data line.
    pub parse_line: LineParser,
}

impl fmt::Debug for FileQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileQuery")
            .field("path", &self.path)
            .field("measurement", &self.measurement)
            .field("mappings", &self.mappings)
            .finish_non_exhaustive()
    }
}

/// Published every [`PROGRESS_EVERY`] mapped points.
///
/// Counts mapped points only: rejected records are skipped and batches
/// dropped on write failure are not subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProgress {
    pub total_points: u64,
}

/// Streams a delimited file through a mapper into the sink.
pub struct FileIngester<W: PointWriter> {
    sink: BatchedSink<W>,
    progress: Progress<FileProgress>,
}

impl<W: PointWriter> FileIngester<W> {
    pub fn new(sink: BatchedSink<W>) -> Self {
        Self {
            sink,
            progress: Progress::new(),
        }
    }

    /// Progress events, one every [`PROGRESS_EVERY`] mapped points.
    pub fn subscribe(&self) -> broadcast::Receiver<FileProgress> {
        self.progress.subscribe()
    }

    pub fn sink(&self) -> &BatchedSink<W> {
        &self.sink
    }

    /// Ingest the file at `query.path`.
    ///
    /// Returns the number of mapped points. Points still buffered when this
    /// returns are written by the next timer flush or an explicit
    /// [`BatchedSink::flush`].
    pub async fn ingest(&self, query: &FileQuery) -> Result<u64> {
        let mapper = mapping::compile(query.measurement.clone(), &query.mappings)?;
        let file = tokio::fs::File::open(&query.path).await?;
        info!(path = %query.path.display(), "ingesting file");
        self.ingest_reader(BufReader::new(file), &mapper, &query.parse_line)
            .await
    }

    /// Ingest lines from any buffered reader. The first non-blank line is
    /// the header.
    pub async fn ingest_reader<R>(
        &self,
        reader: R,
        mapper: &PointMapper,
        parse_line: &LineParser,
    ) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();

        let header = loop {
            match lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break parse_line(&line),
                None => return Ok(0),
            }
        };

        let mut total = 0u64;
        let mut rows = 0u64;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            rows += 1;
            let record = Record::from_row(header.as_slice(), parse_line(&line));
            let point = mapper.map(&record);
            if point.is_some() {
                total += 1;
                if total % PROGRESS_EVERY == 0 {
                    self.progress.publish(FileProgress {
                        total_points: total,
                    });
                }
            }
            self.sink.write_one(point);
        }

        info!(rows, points = total, "file ingested");
        Ok(total)
    }

    /// Close progress subscriptions and stop the sink. Buffered points are
    /// discarded; flush first to keep them.
    pub fn shutdown(mut self) {
        self.progress.close();
        self.sink.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkConfig;
    use crate::mapping::{FieldMapping, TagMapping, TimestampMapping};
    use crate::mock::MockWriter;
    use crate::point::FieldValue;
    use crate::transform;
    use std::io::Write;

    fn mappings() -> Vec<Mapping> {
        vec![
            TimestampMapping::new("time", transform::epoch_ms).into(),
            TagMapping::new("host").to("server").into(),
            FieldMapping::new("elapsed", transform::parse_float).into(),
        ]
    }

    fn query(path: PathBuf) -> FileQuery {
        FileQuery {
            path,
            measurement: "requests".to_string(),
            mappings: mappings(),
            parse_line: split_on(','),
        }
    }

    fn ingester(writer: &MockWriter) -> FileIngester<MockWriter> {
        FileIngester::new(BatchedSink::start(writer.clone(), &SinkConfig::default()))
    }

    #[test]
    fn test_split_on() {
        let parse = split_on('\t');
        assert_eq!(parse("a\tb\t"), vec!["a", "b", ""]);
    }

    #[tokio::test]
    async fn test_ingest_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "time,host,elapsed").expect("write");
        writeln!(file, "1000,web-1,12.5").expect("write");
        writeln!(file).expect("write");
        writeln!(file, "2000,web-2,7").expect("write");
        writeln!(file, "3000,web-3").expect("write");
        writeln!(file, "4000,,1.0").expect("write");
        file.flush().expect("flush");

        let writer = MockWriter::new();
        let ingester = ingester(&writer);

        let total = ingester
            .ingest(&query(file.path().to_path_buf()))
            .await
            .expect("ingest");
        ingester.sink().flush_and_wait().await;

        assert_eq!(total, 2);
        let points = writer.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].measurement, "requests");
        assert_eq!(points[0].timestamp, 1000);
        assert_eq!(points[0].tags.get("server").map(String::as_str), Some("web-1"));
        assert_eq!(points[1].fields.get("elapsed"), Some(&FieldValue::Float(7.0)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let writer = MockWriter::new();
        let err = ingester(&writer)
            .ingest(&query(PathBuf::from("/nonexistent/requests.csv")))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::IngestError::Io(_)));
    }

    #[tokio::test]
    async fn test_invalid_mappings_fail_before_reading() {
        let writer = MockWriter::new();
        let mut q = query(PathBuf::from("/nonexistent/requests.csv"));
        q.mappings.remove(0);

        let err = ingester(&writer).ingest(&q).await.unwrap_err();
        assert!(matches!(err, crate::error::IngestError::Config(_)));
    }

    #[tokio::test]
    async fn test_progress_every_ten_thousand_points() {
        let mut body = String::from("time,host,elapsed\n");
        for i in 0..25_000 {
            body.push_str(&format!("{},h,{}\n", i, i));
        }

        let writer = MockWriter::new();
        let ingester = ingester(&writer);
        let mut rx = ingester.subscribe();
        let mapper = mapping::compile("requests", &mappings()).expect("compile");

        let total = ingester
            .ingest_reader(body.as_bytes(), &mapper, &split_on(','))
            .await
            .expect("ingest");
        ingester.shutdown();

        assert_eq!(total, 25_000);
        let mut events = Vec::new();
        while let Ok(event) = rx.recv().await {
            events.push(event.total_points);
        }
        assert_eq!(events, vec![10_000, 20_000]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let writer = MockWriter::new();
        let mapper = mapping::compile("requests", &mappings()).expect("compile");

        let total = ingester(&writer)
            .ingest_reader(&b"\n\n"[..], &mapper, &split_on(','))
            .await
            .expect("ingest");
        assert_eq!(total, 0);
    }
}

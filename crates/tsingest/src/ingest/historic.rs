// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Historic time-range sweep.

use super::Progress;
use crate::error::Result;
use crate::mapping::{self, Mapping};
use crate::sink::{BatchedSink, PointWriter};
use crate::source::{SearchDriver, SearchService, Window};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A sweep over `[from, to)` in windows of `step`.
#[derive(Debug, Clone)]
pub struct HistoricQuery {
    /// Search expression, without the leading `search` command.
    pub query: String,
    pub measurement: String,
    pub mappings: Vec<Mapping>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub step: TimeDelta,
}

/// Published after every page.
///
/// `total_points` counts mapped points only. Rejected records are never
/// counted, and points in batches dropped on write failure are not
/// subtracted. It is not an exact count of stored points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoricProgress {
    pub total_points: u64,
    pub last_from: DateTime<Utc>,
    pub last_to: DateTime<Utc>,
}

/// Runs one blocking search per window and pages the results into the sink.
pub struct HistoricIngester<W: PointWriter, S: SearchService> {
    sink: BatchedSink<W>,
    driver: SearchDriver<S>,
    progress: Progress<HistoricProgress>,
}

impl<W: PointWriter, S: SearchService> HistoricIngester<W, S> {
    pub fn new(sink: BatchedSink<W>, driver: SearchDriver<S>) -> Self {
        Self {
            sink,
            driver,
            progress: Progress::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoricProgress> {
        self.progress.subscribe()
    }

    pub fn sink(&self) -> &BatchedSink<W> {
        &self.sink
    }

    pub fn driver(&self) -> &SearchDriver<S> {
        &self.driver
    }

    /// Sweep the query's range window by window, then flush and wait until
    /// every batch submitted during the sweep has been written or dropped.
    ///
    /// Windows are queried strictly in order, one at a time. Returns the
    /// number of mapped points.
    pub async fn ingest(&self, query: &HistoricQuery) -> Result<u64> {
        let mapper = mapping::compile(query.measurement.clone(), &query.mappings)?;
        let windows = Window::sweep(query.from, query.to, query.step)?;
        let columns = mapper.columns().to_vec();

        info!(
            from = %query.from,
            to = %query.to,
            step = %query.step,
            "starting historic sweep"
        );

        let mut total = 0u64;
        for window in windows {
            debug!(from = %window.from, to = %window.to, "querying window");
            self.driver
                .query_time_range(&query.query, &columns, &window, |page| {
                    for record in &page.rows {
                        let point = mapper.map(record);
                        if point.is_some() {
                            total += 1;
                        }
                        self.sink.write_one(point);
                    }
                    self.progress.publish(HistoricProgress {
                        total_points: total,
                        last_from: window.from,
                        last_to: window.to,
                    });
                })
                .await?;
        }

        self.sink.flush_and_wait().await;
        info!(points = total, "historic sweep complete");
        Ok(total)
    }

    /// Close progress subscriptions and stop the sink.
    pub fn shutdown(mut self) {
        self.progress.close();
        self.sink.shutdown();
    }
}

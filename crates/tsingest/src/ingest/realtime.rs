// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Realtime search polling.

use super::Progress;
use crate::error::Result;
use crate::mapping::{self, Mapping};
use crate::sink::{BatchedSink, PointWriter};
use crate::source::{SearchDriver, SearchService};
use std::future::Future;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RealtimeQuery {
    /// Search expression, without the leading `search` command.
    pub query: String,
    pub measurement: String,
    pub mappings: Vec<Mapping>,
}

/// Published after every successful poll.
///
/// `total_points` counts mapped points, duplicates across overlapping
/// previews included. Batches dropped on write failure are not subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeProgress {
    pub total_points: u64,
    pub polls: u64,
}

/// Polls a realtime search until halted.
///
/// Preview results overlap between polls, so the same event may be written
/// more than once; the store deduplicates identical points.
pub struct RealtimeIngester<W: PointWriter, S: SearchService> {
    sink: BatchedSink<W>,
    driver: SearchDriver<S>,
    progress: Progress<RealtimeProgress>,
}

impl<W: PointWriter, S: SearchService> RealtimeIngester<W, S> {
    pub fn new(sink: BatchedSink<W>, driver: SearchDriver<S>) -> Self {
        Self {
            sink,
            driver,
            progress: Progress::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeProgress> {
        self.progress.subscribe()
    }

    pub fn sink(&self) -> &BatchedSink<W> {
        &self.sink
    }

    /// Start the realtime job and poll it every poll interval until `halt`
    /// completes, then cancel the job.
    ///
    /// A failed poll is logged and polling continues. Returns the number of
    /// mapped points.
    pub async fn ingest<H>(&self, query: &RealtimeQuery, halt: H) -> Result<u64>
    where
        H: Future<Output = ()>,
    {
        let mapper = mapping::compile(query.measurement.clone(), &query.mappings)?;
        let columns = mapper.columns().to_vec();

        let job = self.driver.start_realtime(&query.query, &columns).await?;
        info!(query = %query.query, "realtime search started");

        let period = self.driver.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(halt);

        let mut total = 0u64;
        let mut polls = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = &mut halt => break,
                _ = ticker.tick() => {
                    match self.driver.poll_realtime(&job, &columns).await {
                        Ok(records) => {
                            polls += 1;
                            for record in &records {
                                let point = mapper.map(record);
                                if point.is_some() {
                                    total += 1;
                                }
                                self.sink.write_one(point);
                            }
                            debug!(rows = records.len(), "realtime poll");
                            self.progress.publish(RealtimeProgress {
                                total_points: total,
                                polls,
                            });
                        }
                        Err(e) => warn!(error = %e, "realtime poll failed"),
                    }
                }
            }
        }

        info!(points = total, polls, "halting realtime search");
        self.driver.cancel(&job).await?;
        Ok(total)
    }

    /// Close progress subscriptions and stop the sink.
    pub fn shutdown(mut self) {
        self.progress.close();
        self.sink.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkConfig;
    use crate::mapping::{FieldMapping, TimestampMapping};
    use crate::mock::{MockSearch, MockWriter};
    use crate::transform;
    use std::time::Duration;

    fn query() -> RealtimeQuery {
        RealtimeQuery {
            query: "index=web".to_string(),
            measurement: "web".to_string(),
            mappings: vec![
                TimestampMapping::new("_time", transform::epoch_ms).into(),
                FieldMapping::new("v", transform::parse_integer).into(),
            ],
        }
    }

    fn ingester(
        writer: &MockWriter,
        search: &MockSearch,
    ) -> RealtimeIngester<MockWriter, MockSearch> {
        RealtimeIngester::new(
            BatchedSink::start(writer.clone(), &SinkConfig::default()),
            SearchDriver::new(search.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_halted_then_cancels() {
        let writer = MockWriter::new();
        let search = MockSearch::with_generated_rows(2);
        let ingester = ingester(&writer, &search);
        let mut rx = ingester.subscribe();

        let total = ingester
            .ingest(&query(), tokio::time::sleep(Duration::from_millis(3500)))
            .await
            .expect("ingest");

        assert_eq!(search.preview_polls(), 3);
        assert_eq!(total, 6);
        assert_eq!(search.cancelled().len(), 1);
        assert_eq!(search.realtime_searches(), vec!["search index=web | table _time, v"]);

        let last = std::iter::from_fn(|| rx.try_recv().ok()).last().expect("progress");
        assert_eq!(last, RealtimeProgress { total_points: 6, polls: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_halt_never_polls() {
        let writer = MockWriter::new();
        let search = MockSearch::with_generated_rows(2);

        let total = ingester(&writer, &search)
            .ingest(&query(), std::future::ready(()))
            .await
            .expect("ingest");

        assert_eq!(total, 0);
        assert_eq!(search.preview_polls(), 0);
        assert_eq!(search.cancelled().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_not_fatal() {
        let writer = MockWriter::new();
        let search = MockSearch::with_generated_rows(2).failing_preview();

        let total = ingester(&writer, &search)
            .ingest(&query(), tokio::time::sleep(Duration::from_millis(2500)))
            .await
            .expect("ingest");

        assert_eq!(total, 0);
        assert_eq!(search.preview_polls(), 2);
        assert_eq!(search.cancelled().len(), 1);
    }
}

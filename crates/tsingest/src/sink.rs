// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batched, fire-and-forget point sink.
//!
//! Points are accumulated in a [`BatchBuffer`] and written through a
//! [`PointWriter`] when the buffer grows past its size threshold or when the
//! periodic flush timer fires, whichever comes first.
//!
//! Writes run on spawned tasks. A failed write is logged and its batch is
//! dropped; nothing is retried and producers are never blocked. Every write
//! task is tracked so [`BatchedSink::flush_and_wait`] can drain them before
//! a run ends.

use crate::buffer::BatchBuffer;
use crate::config::SinkConfig;
use crate::error::{ConnectivityError, SinkWriteError};
use crate::point::Point;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Time-series store capability used by [`BatchedSink`].
pub trait PointWriter: Send + Sync + 'static {
    /// Check the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), ConnectivityError>> + Send;

    /// Write one batch of points.
    fn write(&self, points: &[Point]) -> impl Future<Output = Result<(), SinkWriteError>> + Send;
}

/// Counters reported by [`BatchedSink::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub points_accepted: u64,
    pub batches_written: u64,
    pub points_written: u64,
    pub batches_failed: u64,
    pub points_dropped: u64,
}

struct Shared<W> {
    buffer: Mutex<BatchBuffer>,
    /// Write tasks not yet joined.
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    writer: W,
    points_accepted: AtomicU64,
    batches_written: AtomicU64,
    points_written: AtomicU64,
    batches_failed: AtomicU64,
    points_dropped: AtomicU64,
}

impl<W: PointWriter> Shared<W> {
    /// Swap the buffer out and write its contents, if any.
    fn flush(self: &Arc<Self>) -> bool {
        let batch = {
            let mut buffer = self.buffer.lock();
            if buffer.is_empty() {
                return false;
            }
            buffer.take()
        };
        self.submit(batch);
        true
    }

    fn submit(self: &Arc<Self>, batch: Vec<Point>) {
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let count = batch.len() as u64;
            match shared.writer.write(&batch).await {
                Ok(()) => {
                    shared.batches_written.fetch_add(1, Ordering::Relaxed);
                    shared.points_written.fetch_add(count, Ordering::Relaxed);
                    debug!(points = count, "flushed batch");
                }
                Err(e) => {
                    shared.batches_failed.fetch_add(1, Ordering::Relaxed);
                    shared.points_dropped.fetch_add(count, Ordering::Relaxed);
                    error!(points = count, error = %e, "error flushing points, batch dropped");
                }
            }
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Join every tracked write, including ones submitted while waiting.
    async fn drain(&self) {
        loop {
            let handles = std::mem::take(&mut *self.in_flight.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "flush task failed");
                }
            }
        }
    }
}

/// Buffers points and writes them in batches.
///
/// Must be created inside a Tokio runtime: the flush timer is a spawned
/// task. Dropping the sink (or calling [`BatchedSink::shutdown`]) stops the
/// timer without flushing; callers wanting the residual written call
/// [`BatchedSink::flush_and_wait`] first.
pub struct BatchedSink<W: PointWriter> {
    shared: Arc<Shared<W>>,
    timer: Option<JoinHandle<()>>,
}

impl<W: PointWriter> BatchedSink<W> {
    /// Ping the store, then start the sink.
    ///
    /// Fails if the ping errors or does not answer within the configured
    /// ping timeout.
    pub async fn connect(writer: W, config: &SinkConfig) -> Result<Self, ConnectivityError> {
        let timeout = config.ping_timeout();
        match tokio::time::timeout(timeout, writer.ping()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectivityError::PingTimeout(timeout)),
        }
        info!(
            max_batch_size = config.max_batch_size,
            flush_interval_ms = config.flush_interval_ms,
            "store reachable, sink started"
        );
        Ok(Self::start(writer, config))
    }

    /// Start the sink without pinging the store.
    pub fn start(writer: W, config: &SinkConfig) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(BatchBuffer::new(config.max_batch_size)),
            in_flight: Mutex::new(Vec::new()),
            writer,
            points_accepted: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            points_written: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            points_dropped: AtomicU64::new(0),
        });

        let period = config.flush_interval();
        let timer_shared = Arc::clone(&shared);
        let timer = tokio::spawn(async move {
            // First tick one full period after start.
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                timer_shared.flush();
            }
        });

        Self {
            shared,
            timer: Some(timer),
        }
    }

    /// Buffer one point. `None` is ignored.
    ///
    /// If the buffer grows past its threshold, the whole buffer is flushed
    /// asynchronously.
    pub fn write_one(&self, point: Option<Point>) {
        let Some(point) = point else {
            return;
        };
        self.shared.points_accepted.fetch_add(1, Ordering::Relaxed);
        let full = self.shared.buffer.lock().add(point);
        if let Some(batch) = full {
            self.shared.submit(batch);
        }
    }

    /// Flush the buffered points now without waiting for the write.
    ///
    /// Returns `false` when the buffer was empty.
    pub fn flush(&self) -> bool {
        self.shared.flush()
    }

    /// Flush the buffered points, then wait until every write submitted so
    /// far has completed, threshold and timer flushes included.
    pub async fn flush_and_wait(&self) {
        self.shared.flush();
        self.shared.drain().await;
    }

    /// Wait for every write submitted so far without flushing the buffer.
    pub async fn drain(&self) {
        self.shared.drain().await;
    }

    /// Points currently buffered.
    pub fn pending(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn stats(&self) -> SinkStats {
        let s = &self.shared;
        SinkStats {
            points_accepted: s.points_accepted.load(Ordering::Relaxed),
            batches_written: s.batches_written.load(Ordering::Relaxed),
            points_written: s.points_written.load(Ordering::Relaxed),
            batches_failed: s.batches_failed.load(Ordering::Relaxed),
            points_dropped: s.points_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn writer(&self) -> &W {
        &self.shared.writer
    }

    /// Stop the flush timer. Buffered points are discarded.
    pub fn shutdown(mut self) {
        self.stop_timer();
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("sink flush timer stopped");
        }
    }
}

impl<W: PointWriter> Drop for BatchedSink<W> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockWriter;
    use std::time::Duration;

    fn config(max_batch_size: usize) -> SinkConfig {
        SinkConfig {
            max_batch_size,
            ..SinkConfig::default()
        }
    }

    fn point(ts: i64) -> Point {
        Point::new("m", ts).field("v", ts)
    }

    async fn wait_for(writer: &MockWriter, attempts: usize) {
        tokio::time::timeout(Duration::from_secs(10), writer.wait_for_attempts(attempts))
            .await
            .expect("writer not called in time");
    }

    #[tokio::test]
    async fn test_threshold_flush_writes_whole_buffer() {
        let writer = MockWriter::new();
        let sink = BatchedSink::connect(writer.clone(), &config(3))
            .await
            .expect("connect");

        for ts in 0..4 {
            sink.write_one(Some(point(ts)));
        }
        wait_for(&writer, 1).await;

        let batches = writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(sink.pending(), 0);
    }

    #[tokio::test]
    async fn test_none_is_ignored() {
        let sink = BatchedSink::start(MockWriter::new(), &config(3));

        sink.write_one(None);

        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.stats().points_accepted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_after_one_period() {
        let writer = MockWriter::new();
        let sink = BatchedSink::start(writer.clone(), &config(100));

        sink.write_one(Some(point(1)));
        sink.write_one(Some(point(2)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(writer.attempts(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        wait_for(&writer, 1).await;

        assert_eq!(writer.points().len(), 2);
        assert_eq!(sink.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_skips_empty_buffer() {
        let writer = MockWriter::new();
        let _sink = BatchedSink::start(writer.clone(), &config(100));

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(writer.attempts(), 0);
    }

    #[tokio::test]
    async fn test_manual_flush() {
        let writer = MockWriter::new();
        let sink = BatchedSink::start(writer.clone(), &config(100));

        assert!(!sink.flush());

        sink.write_one(Some(point(1)));
        sink.flush_and_wait().await;

        assert_eq!(writer.batches(), vec![vec![point(1)]]);
        assert_eq!(sink.stats().batches_written, 1);
        assert_eq!(sink.stats().points_written, 1);
    }

    #[tokio::test]
    async fn test_flush_and_wait_joins_earlier_writes() {
        let writer = MockWriter::new().slow_first_write(Duration::from_millis(200));
        let sink = BatchedSink::start(writer.clone(), &config(2));

        // third point crosses the threshold, fourth stays buffered
        for ts in 0..4 {
            sink.write_one(Some(point(ts)));
        }
        assert_eq!(sink.pending(), 1);
        sink.flush_and_wait().await;

        assert_eq!(writer.attempts(), 2);
        assert_eq!(writer.points().len(), 4);
        let stats = sink.stats();
        assert_eq!(stats.batches_written, 2);
        assert_eq!(stats.points_written, 4);
    }

    #[test]
    fn test_nothing_lost_when_runtime_ends_after_flush_and_wait() {
        let writer = MockWriter::new().slow_first_write(Duration::from_millis(200));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let sink = BatchedSink::start(writer.clone(), &config(2));
            for ts in 0..4 {
                sink.write_one(Some(point(ts)));
            }
            sink.flush_and_wait().await;
            sink.shutdown();
        });
        drop(runtime);

        assert_eq!(writer.points().len(), 4);
    }

    #[tokio::test]
    async fn test_drain_leaves_buffer_alone() {
        let writer = MockWriter::new().slow_first_write(Duration::from_millis(100));
        let sink = BatchedSink::start(writer.clone(), &config(2));

        for ts in 0..4 {
            sink.write_one(Some(point(ts)));
        }
        sink.drain().await;

        assert_eq!(writer.points().len(), 3);
        assert_eq!(sink.pending(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_is_dropped_not_retried() {
        let writer = MockWriter::new().failing();
        let sink = BatchedSink::start(writer.clone(), &config(100));

        sink.write_one(Some(point(1)));
        sink.write_one(Some(point(2)));
        sink.flush_and_wait().await;

        assert_eq!(writer.attempts(), 1);
        assert!(writer.batches().is_empty());
        assert_eq!(sink.pending(), 0);
        let stats = sink.stats();
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.points_dropped, 2);

        // later writes are unaffected
        sink.write_one(Some(point(3)));
        assert_eq!(sink.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_residual() {
        let writer = MockWriter::new();
        let sink = BatchedSink::start(writer.clone(), &config(100));

        sink.write_one(Some(point(1)));
        sink.shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(writer.attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        let result = BatchedSink::connect(MockWriter::new().unreachable(), &config(10)).await;
        assert!(matches!(result, Err(ConnectivityError::Ping(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out() {
        let result = BatchedSink::connect(MockWriter::new().hanging(), &config(10)).await;
        assert!(matches!(
            result,
            Err(ConnectivityError::PingTimeout(d)) if d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let writer = MockWriter::new();
        let sink = Arc::new(BatchedSink::start(writer.clone(), &config(10)));

        let mut handles = Vec::new();
        for producer in 0..4i64 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    sink.write_one(Some(point(producer * 100 + i)));
                }
            }));
        }
        for handle in handles {
            handle.await.expect("producer");
        }
        sink.flush_and_wait().await;

        tokio::time::timeout(Duration::from_secs(10), writer.wait_for_points(100))
            .await
            .expect("points not written in time");
        let mut seen: Vec<i64> = writer.points().iter().map(|p| p.timestamp).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }
}

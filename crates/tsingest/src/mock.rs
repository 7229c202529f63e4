// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory store and search engine for tests and local runs.
//!
//! Both mocks are cheap to clone; clones share state, so a test can hand
//! one clone to the pipeline and inspect another.

use crate::error::{ConnectivityError, SinkWriteError, SourceQueryError};
use crate::point::Point;
use crate::sink::PointWriter;
use crate::source::{BlockingSearchParams, ResultSet, SearchService};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct WriterState {
    batches: Mutex<Vec<Vec<Point>>>,
    started: AtomicUsize,
    attempts: AtomicUsize,
    notify: Notify,
}

/// Recording [`PointWriter`].
#[derive(Clone, Default)]
pub struct MockWriter {
    state: Arc<WriterState>,
    fail_writes: bool,
    unreachable: bool,
    hang_on_ping: bool,
    first_write_delay: Option<Duration>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails.
    pub fn failing(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Ping fails.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Ping never answers.
    pub fn hanging(mut self) -> Self {
        self.hang_on_ping = true;
        self
    }

    /// The first write call takes `delay` before completing.
    pub fn slow_first_write(mut self, delay: Duration) -> Self {
        self.first_write_delay = Some(delay);
        self
    }

    /// Successfully written batches, in completion order.
    pub fn batches(&self) -> Vec<Vec<Point>> {
        self.state.batches.lock().clone()
    }

    /// All successfully written points.
    pub fn points(&self) -> Vec<Point> {
        self.state.batches.lock().iter().flatten().cloned().collect()
    }

    /// Write calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_attempts(&self, attempts: usize) {
        self.wait_until(|| self.attempts() >= attempts).await
    }

    pub async fn wait_for_points(&self, points: usize) {
        self.wait_until(|| self.points().len() >= points).await
    }

    async fn wait_until(&self, done: impl Fn() -> bool) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if done() {
                return;
            }
            notified.await;
        }
    }
}

impl PointWriter for MockWriter {
    async fn ping(&self) -> Result<(), ConnectivityError> {
        if self.hang_on_ping {
            std::future::pending::<()>().await;
        }
        if self.unreachable {
            return Err(ConnectivityError::Ping("mock store unreachable".to_string()));
        }
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<(), SinkWriteError> {
        let call = self.state.started.fetch_add(1, Ordering::SeqCst);
        if let (0, Some(delay)) = (call, self.first_write_delay) {
            tokio::time::sleep(delay).await;
        }
        let result = if self.fail_writes {
            Err(SinkWriteError::Http("mock write failure".to_string()))
        } else {
            self.state.batches.lock().push(points.to_vec());
            Ok(())
        };
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        self.state.notify.notify_waiters();
        result
    }
}

/// Blocking search submitted to [`MockSearch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedSearch {
    pub query: String,
    pub params: BlockingSearchParams,
}

/// Job handle issued by [`MockSearch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockJob {
    pub id: u64,
    pub result_count: u64,
}

#[derive(Default)]
struct SearchState {
    next_id: AtomicU64,
    blocking: Mutex<Vec<SubmittedSearch>>,
    realtime: Mutex<Vec<String>>,
    pages: Mutex<Vec<(u64, u64)>>,
    previews: AtomicUsize,
    cancelled: Mutex<Vec<u64>>,
}

/// Scripted [`SearchService`].
///
/// Every job, blocking or realtime, serves the same canned result set.
#[derive(Clone, Default)]
pub struct MockSearch {
    results: Arc<ResultSet>,
    state: Arc<SearchState>,
    fail_fetch_at: Option<u64>,
    fail_preview: bool,
}

impl MockSearch {
    pub fn new(results: ResultSet) -> Self {
        Self {
            results: Arc::new(results),
            ..Self::default()
        }
    }

    /// `count` rows of columns `_time` and `v`, with `_time = i * 1000` and
    /// `v = i`.
    pub fn with_generated_rows(count: u64) -> Self {
        let rows = (0..count)
            .map(|i| vec![Some((i * 1000).to_string()), Some(i.to_string())])
            .collect();
        Self::new(ResultSet {
            fields: vec!["_time".to_string(), "v".to_string()],
            rows,
        })
    }

    /// Fail page fetches starting at `offset`.
    pub fn fail_fetch_at(mut self, offset: u64) -> Self {
        self.fail_fetch_at = Some(offset);
        self
    }

    /// Fail every preview poll.
    pub fn failing_preview(mut self) -> Self {
        self.fail_preview = true;
        self
    }

    pub fn blocking_searches(&self) -> Vec<SubmittedSearch> {
        self.state.blocking.lock().clone()
    }

    pub fn realtime_searches(&self) -> Vec<String> {
        self.state.realtime.lock().clone()
    }

    /// `(offset, count)` of every page request.
    pub fn page_requests(&self) -> Vec<(u64, u64)> {
        self.state.pages.lock().clone()
    }

    pub fn preview_polls(&self) -> usize {
        self.state.previews.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> Vec<u64> {
        self.state.cancelled.lock().clone()
    }

    fn new_job(&self) -> MockJob {
        MockJob {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            result_count: self.results.rows.len() as u64,
        }
    }
}

impl SearchService for MockSearch {
    type Job = MockJob;

    async fn submit_blocking(
        &self,
        query: &str,
        params: &BlockingSearchParams,
    ) -> Result<MockJob, SourceQueryError> {
        self.state.blocking.lock().push(SubmittedSearch {
            query: query.to_string(),
            params: params.clone(),
        });
        Ok(self.new_job())
    }

    fn result_count(&self, job: &MockJob) -> u64 {
        job.result_count
    }

    async fn fetch_page(
        &self,
        _job: &MockJob,
        offset: u64,
        count: u64,
    ) -> Result<ResultSet, SourceQueryError> {
        self.state.pages.lock().push((offset, count));
        if self.fail_fetch_at.is_some_and(|at| offset >= at) {
            return Err(SourceQueryError::Fetch {
                offset,
                message: "mock fetch failure".to_string(),
            });
        }
        let rows = self
            .results
            .rows
            .iter()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect();
        Ok(ResultSet {
            fields: self.results.fields.clone(),
            rows,
        })
    }

    async fn submit_realtime(&self, query: &str) -> Result<MockJob, SourceQueryError> {
        self.state.realtime.lock().push(query.to_string());
        Ok(self.new_job())
    }

    async fn preview_latest(&self, _job: &MockJob) -> Result<ResultSet, SourceQueryError> {
        self.state.previews.fetch_add(1, Ordering::SeqCst);
        if self.fail_preview {
            return Err(SourceQueryError::Preview("mock preview failure".to_string()));
        }
        Ok((*self.results).clone())
    }

    async fn cancel(&self, job: &MockJob) -> Result<(), SourceQueryError> {
        self.state.cancelled.lock().push(job.id);
        Ok(())
    }
}

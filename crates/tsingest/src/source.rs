// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Paginated search source.
//!
//! [`SearchService`] abstracts the remote search engine so the driver can
//! run against Splunk or a mock. [`SearchDriver`] layers the two query modes
//! on top of it:
//!
//! - **time-range**: one blocking search per [`Window`], then sequential
//!   pages of `page_size` rows until the job's result count is exhausted;
//! - **realtime**: one realtime job, then repeated preview polls.
//!
//! The driver never retries and never cancels on its own.

use crate::error::{ConfigError, SourceQueryError};
use crate::record::Record;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::future::Future;
use std::time::Duration;

/// Default number of rows fetched per page.
pub const DEFAULT_PAGE_SIZE: u64 = 50_000;

/// Default delay between realtime preview polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Raw tabular results as returned by the search engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names, in row order.
    pub fields: Vec<String>,
    /// Cells; `None` for null cells.
    pub rows: Vec<Vec<Option<String>>>,
}

/// Parameters of a blocking time-range search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingSearchParams {
    pub earliest_time: String,
    pub latest_time: String,
    /// Maximum results to keep; 0 means unlimited.
    pub count: u64,
}

impl BlockingSearchParams {
    /// Execution mode sent with every blocking search.
    pub const EXEC_MODE: &'static str = "blocking";

    pub fn for_window(window: &Window) -> Self {
        Self {
            earliest_time: format_time(window.from),
            latest_time: format_time(window.to),
            count: 0,
        }
    }
}

/// Remote search engine capability.
///
/// Authentication happens when the implementation is constructed.
pub trait SearchService: Send + Sync {
    /// Handle on a submitted search job.
    type Job: Send + Sync;

    /// Submit a blocking search and return once the job has completed.
    fn submit_blocking(
        &self,
        query: &str,
        params: &BlockingSearchParams,
    ) -> impl Future<Output = Result<Self::Job, SourceQueryError>> + Send;

    /// Total results reported by a completed job.
    fn result_count(&self, job: &Self::Job) -> u64;

    /// Fetch `count` results starting at `offset`.
    fn fetch_page(
        &self,
        job: &Self::Job,
        offset: u64,
        count: u64,
    ) -> impl Future<Output = Result<ResultSet, SourceQueryError>> + Send;

    /// Submit a realtime (`rt` to `rt`) search job.
    fn submit_realtime(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Self::Job, SourceQueryError>> + Send;

    /// Latest preview results of a running job.
    fn preview_latest(
        &self,
        job: &Self::Job,
    ) -> impl Future<Output = Result<ResultSet, SourceQueryError>> + Send;

    /// Cancel a job and release its remote resources.
    fn cancel(&self, job: &Self::Job)
        -> impl Future<Output = Result<(), SourceQueryError>> + Send;
}

/// Half-open time interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Window {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Slice `[start, end)` into consecutive windows of `step`.
    ///
    /// The last window is not clamped to `end`: it always spans a full
    /// step. Fails when `step` is not positive.
    pub fn sweep(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: TimeDelta,
    ) -> Result<Sweep, ConfigError> {
        if step <= TimeDelta::zero() {
            return Err(ConfigError::Invalid(format!(
                "step must be positive, got {}",
                step
            )));
        }
        Ok(Sweep {
            next_from: start,
            end,
            step,
        })
    }
}

/// Iterator over the windows of a historic sweep.
#[derive(Debug, Clone)]
pub struct Sweep {
    next_from: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

impl Iterator for Sweep {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next_from >= self.end {
            return None;
        }
        let from = self.next_from;
        let to = from.checked_add_signed(self.step)?;
        self.next_from = to;
        Some(Window { from, to })
    }
}

/// One page of projected rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub offset: u64,
    pub count: u64,
    pub rows: Vec<Record>,
}

/// Format an instant the way search time bounds are sent.
pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the search string: `search <query> | table <columns>`.
pub fn build_search(query: &str, columns: &[String]) -> String {
    format!("search {} | table {}", query, columns.join(", "))
}

/// Project result rows onto `columns`.
///
/// Requested columns missing from the result set are omitted from every
/// record, as are null cells.
pub fn project(results: &ResultSet, columns: &[String]) -> Vec<Record> {
    let indices: Vec<(&str, usize)> = columns
        .iter()
        .filter_map(|c| {
            results
                .fields
                .iter()
                .position(|f| f == c)
                .map(|i| (c.as_str(), i))
        })
        .collect();

    results
        .rows
        .iter()
        .map(|row| {
            indices
                .iter()
                .filter_map(|&(name, i)| {
                    row.get(i)
                        .and_then(|cell| cell.as_deref())
                        .map(|value| (name, value))
                })
                .collect()
        })
        .collect()
}

/// Drives a [`SearchService`] through time windows, pages and polls.
pub struct SearchDriver<S: SearchService> {
    service: S,
    page_size: u64,
    poll_interval: Duration,
}

impl<S: SearchService> SearchDriver<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the page size (minimum 1).
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run a blocking search over `window` and hand each page to `on_page`
    /// before fetching the next one.
    ///
    /// Returns the job's total result count.
    pub async fn query_time_range<F>(
        &self,
        query: &str,
        columns: &[String],
        window: &Window,
        mut on_page: F,
    ) -> Result<u64, SourceQueryError>
    where
        F: FnMut(Page),
    {
        let search = build_search(query, columns);
        let params = BlockingSearchParams::for_window(window);

        let job = self.service.submit_blocking(&search, &params).await?;
        let result_count = self.service.result_count(&job);

        tracing::info!(
            earliest = %params.earliest_time,
            latest = %params.latest_time,
            "job returned {} results",
            result_count
        );

        let mut offset = 0;
        while offset < result_count {
            let results = self
                .service
                .fetch_page(&job, offset, self.page_size)
                .await?;
            let rows = project(&results, columns);
            tracing::debug!(offset, rows = rows.len(), "fetched page");

            on_page(Page {
                offset,
                count: self.page_size,
                rows,
            });
            offset += self.page_size;
        }

        Ok(result_count)
    }

    /// Submit the realtime job polled by [`SearchDriver::poll_realtime`].
    pub async fn start_realtime(
        &self,
        query: &str,
        columns: &[String],
    ) -> Result<S::Job, SourceQueryError> {
        let search = build_search(query, columns);
        self.service.submit_realtime(&search).await
    }

    /// Latest preview rows of a realtime job, projected onto `columns`.
    ///
    /// Consecutive polls may return overlapping rows.
    pub async fn poll_realtime(
        &self,
        job: &S::Job,
        columns: &[String],
    ) -> Result<Vec<Record>, SourceQueryError> {
        let results = self.service.preview_latest(job).await?;
        Ok(project(&results, columns))
    }

    pub async fn cancel(&self, job: &S::Job) -> Result<(), SourceQueryError> {
        self.service.cancel(job).await
    }
}

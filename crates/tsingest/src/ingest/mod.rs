// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingestion orchestrators.
//!
//! Each orchestrator owns a [`BatchedSink`](crate::sink::BatchedSink),
//! compiles its mapping set once per run, pushes mapped points into the
//! sink and publishes progress events on a broadcast channel.
//!
//! - [`FileIngester`]: delimited text file, header line first.
//! - [`HistoricIngester`]: time-range sweep over the search engine.
//! - [`RealtimeIngester`]: realtime search polled until halted.

pub mod file;
pub mod historic;
pub mod realtime;

pub use file::{FileIngester, FileProgress, FileQuery};
pub use historic::{HistoricIngester, HistoricProgress, HistoricQuery};
pub use realtime::{RealtimeIngester, RealtimeProgress, RealtimeQuery};

use tokio::sync::broadcast;

/// Buffered progress events per subscriber before it starts lagging.
const PROGRESS_CAPACITY: usize = 256;

/// Broadcast publisher for progress events.
///
/// Publishing never blocks and never fails; events sent while nobody is
/// subscribed are discarded. Closing drops the sender so every receiver
/// observes `RecvError::Closed` once drained.
pub(crate) struct Progress<P> {
    tx: Option<broadcast::Sender<P>>,
}

impl<P: Clone> Progress<P> {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(PROGRESS_CAPACITY);
        Self { tx: Some(tx) }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<P> {
        match &self.tx {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub(crate) fn publish(&self, event: P) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub(crate) fn close(&mut self) {
        self.tx = None;
    }
}

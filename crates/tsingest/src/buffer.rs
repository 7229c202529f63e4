// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batching buffer for points awaiting a write.
//!
//! The buffer only decides *when* a batch is due on size; time-based flushes
//! are driven by the sink's background task.

use crate::point::Point;

/// Default soft limit on buffered points.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Append-only batch of points with a soft size threshold.
///
/// Points accumulate until the buffer holds more than `max_size` of them,
/// at which point [`BatchBuffer::add`] hands the whole batch back.
#[derive(Debug)]
pub struct BatchBuffer {
    points: Vec<Point>,
    max_size: usize,
}

impl BatchBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            points: Vec::new(),
            max_size,
        }
    }

    /// Add a point to the buffer.
    ///
    /// Returns `Some(batch)` once the buffer has grown past `max_size`; the
    /// buffer is empty afterwards.
    pub fn add(&mut self, point: Point) -> Option<Vec<Point>> {
        self.points.push(point);
        if self.points.len() > self.max_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Swap the buffered points out, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Point> {
        std::mem::take(&mut self.points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dry-run writer printing Line Protocol to stdout.

use crate::error::{ConnectivityError, SinkWriteError};
use crate::point::{encode_batch, Point};
use crate::sink::PointWriter;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutWriter;

impl PointWriter for StdoutWriter {
    async fn ping(&self) -> Result<(), ConnectivityError> {
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<(), SinkWriteError> {
        let mut body = encode_batch(points);
        if body.is_empty() {
            return Ok(());
        }
        body.push('\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(body.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

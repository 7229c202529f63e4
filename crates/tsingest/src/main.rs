// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tsingest CLI
//!
//! Runs one ingestion job described by a YAML job file.
//!
//! # Usage
//!
//! ```bash
//! # Ingest into InfluxDB
//! tsingest --config job.yaml
//!
//! # Print Line Protocol instead of writing
//! tsingest --config job.yaml --dry-run
//! ```
//!
//! Realtime jobs run until `yes` is typed on stdin or Ctrl+C is pressed.

use anyhow::{Context, Result};
use clap::Parser;
use std::fmt::Debug;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tsingest::clients::{InfluxHttpWriter, SplunkService, StdoutWriter};
use tsingest::config::SplunkConfig;
use tsingest::{
    BatchedSink, FileIngester, HistoricIngester, JobConfig, JobFile, PointWriter,
    RealtimeIngester, SearchDriver,
};

#[derive(Parser, Debug)]
#[command(name = "tsingest")]
#[command(about = "Ingest CSV files and Splunk searches into InfluxDB", long_about = None)]
struct Args {
    /// Job file (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Print points as Line Protocol instead of writing them to InfluxDB
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let job = JobFile::from_file(&args.config)
        .with_context(|| format!("loading job file {}", args.config.display()))?;

    tracing::info!("tsingest starting...");
    tracing::info!("  Job file: {}", args.config.display());
    tracing::info!("  Measurement: {}", job.job.measurement());

    if args.dry_run {
        tracing::info!("  Dry run: writing Line Protocol to stdout");
        run(&job, StdoutWriter).await
    } else {
        tracing::info!("  InfluxDB: {} (db {})", job.influxdb.base_url(), job.influxdb.database);
        let writer = InfluxHttpWriter::new(&job.influxdb)?;
        run(&job, writer).await
    }
}

async fn run<W: PointWriter>(job: &JobFile, writer: W) -> Result<()> {
    let sink = BatchedSink::connect(writer, &job.sink)
        .await
        .context("connecting to the time-series store")?;

    match &job.job {
        JobConfig::Csv(csv) => {
            let query = csv.to_query()?;
            let ingester = FileIngester::new(sink);
            let reporter = report("file", ingester.subscribe());

            let total = ingester.ingest(&query).await?;
            ingester.sink().flush_and_wait().await;

            tracing::info!("Ingested {} points from {}", total, csv.file.display());
            tracing::info!("Sink: {:?}", ingester.sink().stats());
            ingester.shutdown();
            let _ = reporter.await;
        }
        JobConfig::Historic(historic) => {
            let query = historic.to_query()?;
            let mut driver = SearchDriver::new(login(job.splunk.as_ref()).await?);
            if let Some(page_size) = historic.page_size {
                driver = driver.with_page_size(page_size);
            }

            let ingester = HistoricIngester::new(sink, driver);
            let reporter = report("historic", ingester.subscribe());

            let total = ingester.ingest(&query).await?;

            tracing::info!("Ingested {} points from {} to {}", total, query.from, query.to);
            tracing::info!("Sink: {:?}", ingester.sink().stats());
            ingester.shutdown();
            let _ = reporter.await;
        }
        JobConfig::Realtime(realtime) => {
            let query = realtime.to_query()?;
            let mut driver = SearchDriver::new(login(job.splunk.as_ref()).await?);
            if let Some(interval) = realtime.poll_interval() {
                driver = driver.with_poll_interval(interval);
            }

            let ingester = RealtimeIngester::new(sink, driver);
            let reporter = report("realtime", ingester.subscribe());

            tracing::info!("Type 'yes' and press enter (or Ctrl+C) to halt");
            let total = ingester.ingest(&query, halt_requested()).await?;
            // Buffered points are dropped on halt; submitted batches finish.
            ingester.sink().drain().await;

            tracing::info!("Ingested {} points", total);
            tracing::info!("Sink: {:?}", ingester.sink().stats());
            ingester.shutdown();
            let _ = reporter.await;
        }
    }

    Ok(())
}

async fn login(config: Option<&SplunkConfig>) -> Result<SplunkService> {
    let config = config.context("job needs a splunk section")?;
    tracing::info!("  Splunk: {}", config.base_url());
    SplunkService::login(config)
        .await
        .context("logging in to Splunk")
}

/// Log every progress event until the ingester shuts down.
fn report<P>(label: &'static str, mut rx: broadcast::Receiver<P>) -> JoinHandle<()>
where
    P: Clone + Debug + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(progress) => tracing::info!(job = label, "{:?}", progress),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(job = label, skipped, "progress events skipped")
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Completes when the operator types `yes` on stdin or presses Ctrl+C.
async fn halt_requested() {
    let confirmed = async {
        if confirmation(std::io::BufReader::new(std::io::stdin())).await.is_ok() {
            return;
        }
        // stdin closed: only Ctrl+C can halt now
        std::future::pending::<()>().await
    };

    tokio::select! {
        _ = confirmed => tracing::info!("Halt confirmed"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, halting..."),
    }
}

/// Watch `input` for a `yes` line on a detached OS thread.
///
/// The thread is never joined, so a read still blocked at exit does not
/// hold up runtime shutdown. The receiver errors if input ends first.
fn confirmation<R>(input: R) -> oneshot::Receiver<()>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("yes") => {
                    let _ = tx.send(());
                    return;
                }
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    });
    rx
}

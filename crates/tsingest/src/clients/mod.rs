// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete store writers and search services.

pub mod influx;
pub mod splunk;
pub mod stdout;

pub use influx::InfluxHttpWriter;
pub use splunk::{SplunkJob, SplunkService};
pub use stdout::StdoutWriter;

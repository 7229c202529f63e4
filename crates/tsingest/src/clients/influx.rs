// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB 1.x HTTP writer.
//!
//! Liveness is `GET /ping`; batches go to `POST /write?db=<db>&precision=ms`
//! as Line Protocol bodies. Basic auth is sent when a username is set.

use crate::config::InfluxDbConfig;
use crate::error::{ConnectivityError, SinkWriteError};
use crate::point::{encode_batch, Point};
use crate::sink::PointWriter;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// Timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct InfluxHttpWriter {
    client: Client,
    base_url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxHttpWriter {
    pub fn new(config: &InfluxDbConfig) -> Result<Self, ConnectivityError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConnectivityError::Ping(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn write_url(&self) -> String {
        format!("{}/write", self.base_url)
    }

    pub fn ping_url(&self) -> String {
        format!("{}/ping", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}

impl PointWriter for InfluxHttpWriter {
    async fn ping(&self) -> Result<(), ConnectivityError> {
        let url = self.ping_url();
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ConnectivityError::Ping(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ConnectivityError::Ping(format!(
                "{} answered {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<(), SinkWriteError> {
        let body = encode_batch(points);
        if body.is_empty() {
            return Ok(());
        }

        let response = self
            .authorize(self.client.post(self.write_url()))
            .query(&[("db", self.database.as_str()), ("precision", "ms")])
            .body(body)
            .send()
            .await
            .map_err(|e| SinkWriteError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkWriteError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_from_config() {
        let config = InfluxDbConfig {
            host: "influx.local".to_string(),
            port: 8086,
            protocol: "http".to_string(),
            username: None,
            password: None,
            database: "metrics".to_string(),
        };
        let writer = InfluxHttpWriter::new(&config).expect("client");

        assert_eq!(writer.ping_url(), "http://influx.local:8086/ping");
        assert_eq!(writer.write_url(), "http://influx.local:8086/write");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let config = InfluxDbConfig {
            host: "unreachable.invalid".to_string(),
            port: 1,
            protocol: "http".to_string(),
            username: Some("u".to_string()),
            password: Some("p".to_string()),
            database: "metrics".to_string(),
        };
        let writer = InfluxHttpWriter::new(&config).expect("client");

        writer
            .write(&[Point::new("m", 1)])
            .await
            .expect("fieldless batch is a no-op");
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Splunk REST API search service.
//!
//! # Endpoints
//!
//! | call            | request                                             |
//! |-----------------|-----------------------------------------------------|
//! | login           | `POST /services/auth/login`                         |
//! | submit          | `POST /services/search/jobs`                        |
//! | job status      | `GET  /services/search/jobs/<sid>`                  |
//! | results page    | `GET  /services/search/jobs/<sid>/results`          |
//! | preview         | `GET  /services/search/jobs/<sid>/results_preview`  |
//! | cancel          | `POST /services/search/jobs/<sid>/control`          |
//!
//! Results are requested in `json_rows` mode.

use crate::config::SplunkConfig;
use crate::error::{ConnectivityError, SourceQueryError};
use crate::source::{BlockingSearchParams, ResultSet, SearchService};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticated Splunk session.
#[derive(Debug, Clone)]
pub struct SplunkService {
    client: Client,
    base_url: String,
    session_key: String,
}

/// Search job handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplunkJob {
    pub sid: String,
    /// Known once a blocking job has completed; 0 for realtime jobs.
    pub result_count: u64,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionKey")]
    session_key: String,
}

#[derive(Deserialize)]
struct CreateJobResponse {
    sid: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    entry: Vec<JobEntry>,
}

#[derive(Deserialize)]
struct JobEntry {
    content: JobContent,
}

#[derive(Deserialize)]
struct JobContent {
    #[serde(rename = "resultCount")]
    result_count: Value,
}

#[derive(Deserialize)]
struct RowsResponse {
    #[serde(default)]
    fields: Vec<FieldName>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Field names come back as plain strings or as `{"name": ...}` objects
/// depending on the server version.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldName {
    Plain(String),
    Named { name: String },
}

impl FieldName {
    fn into_string(self) -> String {
        match self {
            FieldName::Plain(name) | FieldName::Named { name } => name,
        }
    }
}

impl SplunkService {
    /// Log in and keep the session key for later calls.
    pub async fn login(config: &SplunkConfig) -> Result<Self, ConnectivityError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| ConnectivityError::Login(format!("cannot build HTTP client: {}", e)))?;
        let base_url = config.base_url();

        let response = client
            .post(format!("{}/services/auth/login", base_url))
            .form(&[
                ("username", config.username.as_str()),
                ("password", config.password.as_str()),
                ("output_mode", "json"),
            ])
            .send()
            .await
            .map_err(|e| ConnectivityError::Login(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectivityError::Login(format!("{}: {}", status, body)));
        }
        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ConnectivityError::Login(format!("unexpected login response: {}", e)))?;

        info!(url = %base_url, user = %config.username, "logged in to search head");
        Ok(Self {
            client,
            base_url,
            session_key: login.session_key,
        })
    }

    fn job_url(&self, sid: &str, suffix: &str) -> String {
        format!("{}/services/search/jobs/{}{}", self.base_url, sid, suffix)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Splunk {}", self.session_key))
    }

    async fn create_job(&self, search: &str, params: &[(&str, String)]) -> Result<String, SourceQueryError> {
        let mut form: Vec<(&str, &str)> = vec![("search", search), ("output_mode", "json")];
        form.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self
            .authorize(self.client.post(format!("{}/services/search/jobs", self.base_url)))
            .form(&form)
            .send()
            .await
            .map_err(|e| SourceQueryError::Submit(e.to_string()))?;
        let response = check(response).await.map_err(SourceQueryError::Submit)?;

        let created: CreateJobResponse = response
            .json()
            .await
            .map_err(|e| SourceQueryError::Protocol(format!("job creation: {}", e)))?;
        debug!(sid = %created.sid, "search job created");
        Ok(created.sid)
    }

    async fn job_result_count(&self, sid: &str) -> Result<u64, SourceQueryError> {
        let response = self
            .authorize(self.client.get(self.job_url(sid, "")))
            .query(&[("output_mode", "json")])
            .send()
            .await
            .map_err(|e| SourceQueryError::Submit(e.to_string()))?;
        let response = check(response).await.map_err(SourceQueryError::Submit)?;

        let status: JobStatusResponse = response
            .json()
            .await
            .map_err(|e| SourceQueryError::Protocol(format!("job status: {}", e)))?;
        parse_result_count(status)
    }

    async fn get_rows(
        &self,
        sid: &str,
        endpoint: &str,
        paging: Option<(u64, u64)>,
    ) -> Result<ResultSet, String> {
        let mut query = vec![("output_mode", "json_rows".to_string())];
        if let Some((offset, count)) = paging {
            query.push(("offset", offset.to_string()));
            query.push(("count", count.to_string()));
        }

        let response = self
            .authorize(self.client.get(self.job_url(sid, endpoint)))
            .query(&query)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let response = check(response).await?;

        // No results available yet.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(ResultSet::default());
        }
        let rows: RowsResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(into_result_set(rows))
    }
}

impl SearchService for SplunkService {
    type Job = SplunkJob;

    async fn submit_blocking(
        &self,
        query: &str,
        params: &BlockingSearchParams,
    ) -> Result<SplunkJob, SourceQueryError> {
        let mut form = vec![
            ("exec_mode", BlockingSearchParams::EXEC_MODE.to_string()),
            ("earliest_time", params.earliest_time.clone()),
            ("latest_time", params.latest_time.clone()),
        ];
        if params.count > 0 {
            form.push(("max_count", params.count.to_string()));
        }

        let sid = self.create_job(query, &form).await?;
        let result_count = self.job_result_count(&sid).await?;
        Ok(SplunkJob { sid, result_count })
    }

    fn result_count(&self, job: &SplunkJob) -> u64 {
        job.result_count
    }

    async fn fetch_page(
        &self,
        job: &SplunkJob,
        offset: u64,
        count: u64,
    ) -> Result<ResultSet, SourceQueryError> {
        self.get_rows(&job.sid, "/results", Some((offset, count)))
            .await
            .map_err(|message| SourceQueryError::Fetch { offset, message })
    }

    async fn submit_realtime(&self, query: &str) -> Result<SplunkJob, SourceQueryError> {
        let form = [
            ("earliest_time", "rt".to_string()),
            ("latest_time", "rt".to_string()),
        ];
        let sid = self.create_job(query, &form).await?;
        Ok(SplunkJob {
            sid,
            result_count: 0,
        })
    }

    async fn preview_latest(&self, job: &SplunkJob) -> Result<ResultSet, SourceQueryError> {
        self.get_rows(&job.sid, "/results_preview", None)
            .await
            .map_err(SourceQueryError::Preview)
    }

    async fn cancel(&self, job: &SplunkJob) -> Result<(), SourceQueryError> {
        let response = self
            .authorize(self.client.post(self.job_url(&job.sid, "/control")))
            .form(&[("action", "cancel"), ("output_mode", "json")])
            .send()
            .await
            .map_err(|e| SourceQueryError::Cancel(e.to_string()))?;
        check(response).await.map_err(SourceQueryError::Cancel)?;
        debug!(sid = %job.sid, "search job cancelled");
        Ok(())
    }
}

/// Turn a non-success response into its status and body.
async fn check(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("{}: {}", status, body))
}

fn parse_result_count(status: JobStatusResponse) -> Result<u64, SourceQueryError> {
    let entry = status
        .entry
        .into_iter()
        .next()
        .ok_or_else(|| SourceQueryError::Protocol("job status has no entry".to_string()))?;

    let count = match &entry.content.result_count {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| {
        SourceQueryError::Protocol(format!(
            "invalid resultCount: {}",
            entry.content.result_count
        ))
    })
}

fn into_result_set(response: RowsResponse) -> ResultSet {
    ResultSet {
        fields: response.fields.into_iter().map(FieldName::into_string).collect(),
        rows: response
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect(),
    }
}

/// Multi-value cells are joined with commas.
fn cell_to_string(cell: Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(values) => {
            let parts: Vec<String> = values.into_iter().filter_map(cell_to_string).collect();
            Some(parts.join(","))
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_rows() {
        let body = r#"{
            "preview": false,
            "init_offset": 0,
            "messages": [],
            "fields": ["_time", "host", {"name": "count"}],
            "rows": [
                ["2024-01-01T00:00:00.000+00:00", "web-1", "3"],
                ["2024-01-01T00:01:00.000+00:00", null, 7],
                ["2024-01-01T00:02:00.000+00:00", ["a", "b"], true]
            ]
        }"#;
        let rows: RowsResponse = serde_json::from_str(body).expect("json");
        let results = into_result_set(rows);

        assert_eq!(results.fields, vec!["_time", "host", "count"]);
        assert_eq!(results.rows[0][1].as_deref(), Some("web-1"));
        assert_eq!(results.rows[1][1], None);
        assert_eq!(results.rows[1][2].as_deref(), Some("7"));
        assert_eq!(results.rows[2][1].as_deref(), Some("a,b"));
        assert_eq!(results.rows[2][2].as_deref(), Some("true"));
    }

    #[test]
    fn test_parse_empty_rows() {
        let rows: RowsResponse = serde_json::from_str("{}").expect("json");
        assert_eq!(into_result_set(rows), ResultSet::default());
    }

    #[test]
    fn test_parse_result_count() {
        let numeric: JobStatusResponse =
            serde_json::from_str(r#"{"entry":[{"name":"x","content":{"resultCount":120000,"isDone":true}}]}"#)
                .expect("json");
        assert_eq!(parse_result_count(numeric).expect("count"), 120_000);

        let text: JobStatusResponse =
            serde_json::from_str(r#"{"entry":[{"content":{"resultCount":"42"}}]}"#).expect("json");
        assert_eq!(parse_result_count(text).expect("count"), 42);

        let empty: JobStatusResponse = serde_json::from_str(r#"{"entry":[]}"#).expect("json");
        assert!(matches!(
            parse_result_count(empty),
            Err(SourceQueryError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_login_and_sid() {
        let login: LoginResponse = serde_json::from_str(r#"{"sessionKey":"abc123"}"#).expect("json");
        assert_eq!(login.session_key, "abc123");

        let job: CreateJobResponse = serde_json::from_str(r#"{"sid":"1700000000.42"}"#).expect("json");
        assert_eq!(job.sid, "1700000000.42");
    }
}

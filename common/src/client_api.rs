//! Client-server connection utilities for the conference API.

use crate::{BatchResponse, CLIENT_VERSION, ExistingConference};
use anyhow::{Context, Result, anyhow, bail};
use log::{debug, warn};
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The three write operations the API accepts on its single endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Insert,
    Update,
    Delete,
}

impl BatchOperation {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            BatchOperation::Insert => Method::POST,
            BatchOperation::Update => Method::PUT,
            BatchOperation::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchOperation::Insert => "insert",
            BatchOperation::Update => "update",
            BatchOperation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Why a whole batch could not be attributed record by record.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("server returned an error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("network error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },
    #[error("response is not JSON ({message}): {body}")]
    Decode { message: String, body: String },
    #[error("could not encode batch: {0}")]
    Encode(String),
}

/// The remote side of a sync: one listing read, and batched writes.
pub trait ConferenceStore {
    /// Read every conference currently stored.
    ///
    /// # Errors
    /// Returns an error for network failures, non-success statuses, or a body that is
    /// not a JSON array.
    fn fetch_existing(&self) -> Result<Vec<ExistingConference>>;

    /// Send one batch. `batch` is the JSON array request body.
    ///
    /// # Errors
    /// Returns a [`BatchError`] describing why no per-record results are available.
    fn send_batch(
        &self,
        operation: BatchOperation,
        batch: &Value,
    ) -> Result<BatchResponse, BatchError>;
}

/// Helper function to classify reqwest error types
pub(crate) fn error_type_str(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection"
    } else if e.is_request() {
        "request/DNS"
    } else if e.is_body() {
        "body"
    } else if e.is_decode() {
        "decode"
    } else {
        "unknown"
    }
}

/// Build the blocking HTTP client shared by every call in a run.
/// All requests carry a JSON content type and the same timeout.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(format!("cfp_sync/{CLIENT_VERSION}"))
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

/// A [`ConferenceStore`] backed by the JSON API.
pub struct HttpConferenceStore {
    client: Client,
    api_url: String,
}

impl HttpConferenceStore {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

impl ConferenceStore for HttpConferenceStore {
    fn fetch_existing(&self) -> Result<Vec<ExistingConference>> {
        let response = self
            .client
            .get(&self.api_url)
            .send()
            .map_err(|e| anyhow!("Network error ({}): {e}", error_type_str(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read existing conferences")?;
        if !status.is_success() {
            bail!("Server returned an error ({status}): {body}");
        }
        parse_existing(&body)
    }

    fn send_batch(
        &self,
        operation: BatchOperation,
        batch: &Value,
    ) -> Result<BatchResponse, BatchError> {
        let transport = |e: reqwest::Error| BatchError::Transport {
            kind: error_type_str(&e),
            message: e.to_string(),
        };

        let response = self
            .client
            .request(operation.method(), &self.api_url)
            .json(batch)
            .send()
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().map_err(transport)?;
        debug!("{operation} batch answered {status}: {body}");
        if !status.is_success() {
            return Err(BatchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_batch_response(&body)
    }
}

/// Parse the listing of stored conferences.
/// Malformed entries are skipped so that one bad row does not hide the rest.
///
/// # Errors
/// Returns an error if the body is not JSON or not an array.
pub fn parse_existing(body: &str) -> Result<Vec<ExistingConference>> {
    let value: Value = serde_json::from_str(body)
        .with_context(|| format!("Existing conferences response is not JSON: {body}"))?;
    let Value::Array(entries) = value else {
        bail!("Expected a JSON array of conferences, got: {body}");
    };

    let mut conferences = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ExistingConference>(entry) {
            Ok(conference) => conferences.push(conference),
            Err(e) => warn!("Skipping malformed existing conference #{}: {e}", i + 1),
        }
    }
    Ok(conferences)
}

/// Parse the body of a successful batch call.
///
/// # Errors
/// Returns [`BatchError::Decode`] if the body is not a JSON results object.
pub fn parse_batch_response(body: &str) -> Result<BatchResponse, BatchError> {
    serde_json::from_str(body).map_err(|e| BatchError::Decode {
        message: e.to_string(),
        body: body.to_string(),
    })
}

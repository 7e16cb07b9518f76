//! Shared fixtures for unit tests.

use crate::client_api::{BatchError, BatchOperation, ConferenceStore};
use crate::{
    BatchResponse, ConferenceRecord, DEFAULT_LINK_BASE, ExistingConference, RecordResult,
    SyncConfig,
};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use url::Url;

/// A scripted answer to one batch call.
pub enum Reply {
    Results(Vec<RecordResult>),
    Status(u16),
    Transport,
    NotJson,
}

/// An in-memory store that records every batch and answers from a script.
/// Once the script runs out, every record of a batch is accepted.
pub struct MockStore {
    existing: Option<Vec<ExistingConference>>,
    replies: RefCell<VecDeque<Reply>>,
    calls: RefCell<Vec<(BatchOperation, Vec<Value>)>>,
}

impl MockStore {
    /// `None` makes the existing-conference read fail.
    pub fn new(existing: Option<Vec<ExistingConference>>) -> Self {
        Self {
            existing,
            replies: RefCell::new(VecDeque::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Some(Vec::new()))
    }

    pub fn replying(replies: Vec<Reply>) -> Self {
        Self::accepting().with_replies(replies)
    }

    pub fn with_replies(self, replies: Vec<Reply>) -> Self {
        *self.replies.borrow_mut() = replies.into();
        self
    }

    pub fn calls(&self) -> Vec<(BatchOperation, Vec<Value>)> {
        self.calls.borrow().clone()
    }
}

fn accept_all(operation: BatchOperation, count: usize) -> BatchResponse {
    let message = match operation {
        BatchOperation::Insert => "insert succeeded",
        BatchOperation::Update => "update succeeded",
        BatchOperation::Delete => "delete succeeded",
    };
    BatchResponse {
        results: (0..count).map(|_| result(message, None)).collect(),
    }
}

impl ConferenceStore for MockStore {
    fn fetch_existing(&self) -> Result<Vec<ExistingConference>> {
        self.existing
            .clone()
            .ok_or_else(|| anyhow!("Server returned an error (503): unavailable"))
    }

    fn send_batch(
        &self,
        operation: BatchOperation,
        batch: &Value,
    ) -> Result<BatchResponse, BatchError> {
        let items = batch.as_array().cloned().unwrap_or_default();
        let count = items.len();
        self.calls.borrow_mut().push((operation, items));

        match self.replies.borrow_mut().pop_front() {
            None => Ok(accept_all(operation, count)),
            Some(Reply::Results(results)) => Ok(BatchResponse { results }),
            Some(Reply::Status(status)) => Err(BatchError::Status {
                status,
                body: "Internal Server Error".to_string(),
            }),
            Some(Reply::Transport) => Err(BatchError::Transport {
                kind: "timeout",
                message: "operation timed out".to_string(),
            }),
            Some(Reply::NotJson) => Err(BatchError::Decode {
                message: "expected value at line 1 column 1".to_string(),
                body: "<b>Warning</b>".to_string(),
            }),
        }
    }
}

pub fn result(message: &str, id: Option<u64>) -> RecordResult {
    RecordResult {
        message: Some(message.to_string()),
        id_conference: id,
        error: None,
    }
}

pub fn test_config() -> SyncConfig {
    SyncConfig::new(Url::parse(DEFAULT_LINK_BASE).unwrap())
}

pub fn record(acronym: &str, start_date: &str) -> ConferenceRecord {
    ConferenceRecord {
        acronym: acronym.to_string(),
        name: format!("{acronym} conference"),
        location: "Online".to_string(),
        deadline: "2025-01-01".to_string(),
        start_date: start_date.to_string(),
        topics: String::new(),
        url: String::new(),
        id_conference: None,
    }
}

/// The record expected from the ICML row built by [`listing_row`].
pub fn icml_record() -> ConferenceRecord {
    ConferenceRecord {
        acronym: "ICML2025".to_string(),
        name: "Intl. Conf. on ML".to_string(),
        location: "Vancouver".to_string(),
        deadline: "2025-01-15".to_string(),
        start_date: "2025-07-10".to_string(),
        topics: "ML, AI".to_string(),
        url: "https://easychair.org/cfp/ICML2025".to_string(),
        id_conference: None,
    }
}

pub fn listing_row(
    acronym: &str,
    href: Option<&str>,
    name: &str,
    location: &str,
    deadline: &str,
    start: &str,
    topics: &[&str],
) -> String {
    let acronym_cell = match href {
        Some(href) => format!("<a href=\"{href}\">{acronym}</a>"),
        None => acronym.to_string(),
    };
    let badges: String = topics
        .iter()
        .map(|t| format!("<span class=\"badge\">{t}</span> "))
        .collect();
    format!(
        "<tr><td>{acronym_cell}</td><td>{name}</td><td>{location}</td>\
         <td> {deadline} </td><td>{start}</td><td>{badges}</td></tr>"
    )
}

pub fn listing_page(rows: &[String]) -> String {
    format!(
        "<html><body><table class=\"ct_table\"><thead><tr><th>Acronym</th></tr></thead>\
         <tbody>{}</tbody></table></body></html>",
        rows.concat()
    )
}

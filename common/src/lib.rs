//! A library with common utilities for scraping conference listings and syncing them to a remote API.

pub mod client_api;
pub mod dates;
pub mod extract;
pub mod pipeline;
pub mod reconcile;
pub mod source;
pub mod submit;

#[cfg(test)]
pub(crate) mod test_support;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_SOURCE_URL: &str = "https://easychair.org/cfp/";
pub const DEFAULT_API_URL: &str = "https://api.rpa4edu.shop/api_research.php";
pub const DEFAULT_LINK_BASE: &str = "https://easychair.org";
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const CLIENT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const MSG_INSERT_SUCCEEDED: &str = "insert succeeded";
pub const MSG_ALREADY_EXISTS: &str = "conference already exists";
pub const MSG_UPDATE_SUCCEEDED: &str = "update succeeded";
pub const MSG_DELETE_SUCCEEDED: &str = "delete succeeded";

/// One conference scraped from the listing, in the shape the API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceRecord {
    pub acronym: String,
    pub name: String,
    pub location: String,
    /// ISO 8601 if the listing date parsed, otherwise the raw text.
    pub deadline: String,
    /// ISO 8601 if the listing date parsed, otherwise the raw text.
    pub start_date: String,
    pub topics: String,
    pub url: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_id"
    )]
    pub id_conference: Option<u64>,
}

impl ConferenceRecord {
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.acronym, &self.start_date)
    }
}

/// The (acronym, start date) pair used to match scraped and stored conferences.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NaturalKey {
    pub acronym: String,
    pub start_date: String,
}

impl NaturalKey {
    pub fn new(acronym: impl Into<String>, start_date: impl Into<String>) -> Self {
        Self {
            acronym: acronym.into(),
            start_date: start_date.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.acronym, self.start_date)
    }
}

/// A conference as returned by the API listing. Other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExistingConference {
    pub acronym: String,
    pub start_date: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id_conference: u64,
}

impl ExistingConference {
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.acronym, &self.start_date)
    }
}

/// A conference the caller wants removed from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRequest {
    pub id_conference: u64,
    pub acronym: String,
}

/// Parses `ID:ACRONYM`, e.g. `12:ICML2025`.
impl FromStr for DeleteRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, acronym) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected ID:ACRONYM, got {s:?}"))?;
        let id_conference = id
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid conference id {id:?}"))?;
        let acronym = acronym.trim();
        if acronym.is_empty() {
            return Err(anyhow!("missing acronym in {s:?}"));
        }
        Ok(Self {
            id_conference,
            acronym: acronym.to_string(),
        })
    }
}

/// The body returned for a POST, PUT or DELETE batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<RecordResult>,
}

/// One entry of a batch response, aligned by position with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id_conference: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The message phrases the API uses to report each per-record outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessages {
    pub inserted: String,
    pub already_exists: String,
    pub updated: String,
    pub deleted: String,
}

impl Default for ResponseMessages {
    fn default() -> Self {
        Self {
            inserted: MSG_INSERT_SUCCEEDED.to_string(),
            already_exists: MSG_ALREADY_EXISTS.to_string(),
            updated: MSG_UPDATE_SUCCEEDED.to_string(),
            deleted: MSG_DELETE_SUCCEEDED.to_string(),
        }
    }
}

/// Everything a sync run needs beyond the page and the store.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Relative conference links are resolved against this.
    pub link_base: Url,
    pub batch_size: usize,
    pub messages: ResponseMessages,
    /// Empty unless the caller explicitly asks for deletions.
    pub deletes: Vec<DeleteRequest>,
}

impl SyncConfig {
    #[must_use]
    pub fn new(link_base: Url) -> Self {
        Self {
            link_base,
            batch_size: DEFAULT_BATCH_SIZE,
            messages: ResponseMessages::default(),
            deletes: Vec::new(),
        }
    }
}

/// The API may send ids as numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

fn id_from_repr(repr: IdRepr) -> Result<u64, String> {
    match repr {
        IdRepr::Number(id) => Ok(id),
        IdRepr::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid id {text:?}: {e}")),
    }
}

/// Deserialize an id given either as a JSON number or a numeric string.
///
/// # Errors
/// Returns an error if the value is neither, or the string is not a number.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = IdRepr::deserialize(deserializer)?;
    id_from_repr(repr).map_err(serde::de::Error::custom)
}

/// Like [`deserialize_id`], but `null` becomes `None`.
///
/// # Errors
/// Returns an error if a present value is not a valid id.
pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<IdRepr>::deserialize(deserializer)?;
    repr.map(id_from_repr)
        .transpose()
        .map_err(serde::de::Error::custom)
}

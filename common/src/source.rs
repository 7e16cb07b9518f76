//! Fetch the conference listing page.

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use reqwest::blocking::Client;

use crate::client_api::error_type_str;

/// Download the listing page as text.
///
/// # Errors
/// Returns an error on any network failure or non-success status, since
/// nothing useful can be scraped from a partial page.
pub fn fetch_source_page(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| anyhow!("Network error ({}) fetching {url}: {e}", error_type_str(&e)))?;

    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {status} for {url}");
    }

    let body = response
        .text()
        .with_context(|| format!("Failed to read response body from {url}"))?;
    debug!("Fetched {} bytes from {url}", body.len());
    Ok(body)
}

//! Extract conference records from the listing page markup.

use crate::ConferenceRecord;
use crate::dates::normalize_date;
use itertools::Itertools;
use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Rows with fewer cells than this are not conference rows.
pub const MIN_COLUMNS: usize = 6;

const ROW_SELECTOR: &str = "table tbody tr";
const LINK_SELECTOR: &str = "a[href]";
const TOPIC_SELECTOR: &str = "span.badge";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector {
        selector: &'static str,
        message: String,
    },
    #[error("could not resolve link {href:?} against {base}: {source}")]
    Link {
        href: String,
        base: Url,
        #[source]
        source: url::ParseError,
    },
}

/// Counts describing how the page's rows were handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub rows_seen: usize,
    pub rows_short: usize,
    pub rows_failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<ConferenceRecord>,
    pub stats: ExtractStats,
}

struct Selectors {
    row: Selector,
    link: Selector,
    topic: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            row: parse_selector(ROW_SELECTOR)?,
            link: parse_selector(LINK_SELECTOR)?,
            topic: parse_selector(TOPIC_SELECTOR)?,
        })
    }
}

fn parse_selector(selector: &'static str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector,
        message: e.to_string(),
    })
}

/// Parse every listing row into a record.
/// Short rows are skipped, and a row that fails is logged and skipped without
/// affecting the rest.
///
/// # Errors
/// Only fails if the built-in selectors cannot be compiled.
pub fn extract_conferences(html: &str, link_base: &Url) -> Result<Extraction, ExtractError> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(html);
    let rows: Vec<ElementRef> = document.select(&selectors.row).collect();
    info!("Found {} rows to process.", rows.len());

    let mut extraction = Extraction::default();
    extraction.stats.rows_seen = rows.len();

    for (i, row) in rows.iter().enumerate() {
        match extract_row(row, &selectors, link_base) {
            Ok(Some(record)) => extraction.records.push(record),
            Ok(None) => {
                debug!("Row {}/{}: too few columns, skipped.", i + 1, rows.len());
                extraction.stats.rows_short += 1;
            }
            Err(e) => {
                warn!("Error at row {}/{}: {e}", i + 1, rows.len());
                extraction.stats.rows_failed += 1;
            }
        }
    }

    info!(
        "Extracted {} conferences ({} short rows, {} failed rows).",
        extraction.records.len(),
        extraction.stats.rows_short,
        extraction.stats.rows_failed
    );
    Ok(extraction)
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn extract_row(
    row: &ElementRef,
    selectors: &Selectors,
    link_base: &Url,
) -> Result<Option<ConferenceRecord>, ExtractError> {
    let cols: Vec<ElementRef> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect();
    if cols.len() < MIN_COLUMNS {
        return Ok(None);
    }

    let url = match cols[0]
        .select(&selectors.link)
        .next()
        .and_then(|a| a.value().attr("href"))
    {
        Some(href) => resolve_link(href, link_base)?,
        None => String::new(),
    };

    let topics = cols[5]
        .select(&selectors.topic)
        .map(|badge| cell_text(&badge))
        .join(", ");

    Ok(Some(ConferenceRecord {
        acronym: cell_text(&cols[0]),
        name: cell_text(&cols[1]),
        location: cell_text(&cols[2]),
        deadline: normalize_date(&cell_text(&cols[3])),
        start_date: normalize_date(&cell_text(&cols[4])),
        topics,
        url,
        id_conference: None,
    }))
}

/// Turn a listing link into an absolute URL.
/// Links that already carry an http(s) scheme are kept as they are.
///
/// # Errors
/// Returns an error if a relative link cannot be joined onto `link_base`.
pub fn resolve_link(href: &str, link_base: &Url) -> Result<String, ExtractError> {
    let href = href.trim();
    if href.is_empty() {
        return Ok(String::new());
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }
    link_base
        .join(href)
        .map(String::from)
        .map_err(|source| ExtractError::Link {
            href: href.to_string(),
            base: link_base.clone(),
            source,
        })
}

//! Date normalization for the listing's human-readable dates.

use chrono::NaiveDate;
use log::debug;

/// The format the listing uses, e.g. `Jan 15, 2025`.
pub const SOURCE_DATE_FORMAT: &str = "%b %d, %Y";
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Convert a listing date into `YYYY-MM-DD`.
/// Anything that does not parse is passed through unchanged.
#[must_use]
pub fn normalize_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, SOURCE_DATE_FORMAT) {
        Ok(date) => date.format(ISO_DATE_FORMAT).to_string(),
        Err(e) => {
            debug!("Keeping unparsed date {raw:?}: {e}");
            raw.to_string()
        }
    }
}

//! Timestamp parsing for feed date fields
//!
//! The feed is inconsistent about precision: most records carry microsecond
//! timestamps, older ones only a whole-second time or a bare date. Formats are
//! tried in a fixed order and the first match wins.

use chrono::{NaiveDate, NaiveDateTime};

/// Date-time formats, most precise first. `%.f` consumes the leading dot.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Longest accepted fraction. `%.f` alone would take up to nine digits, which
/// the database then rounds to microseconds.
const MAX_FRACTION_DIGITS: usize = 6;

/// Bare date format, interpreted as midnight.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a feed timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS.ffffff`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. Returns `None` for empty input or when no format matches;
/// callers decide whether that discards the record or nulls the field.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() || !fraction_fits_micros(value) {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn fraction_fits_micros(value: &str) -> bool {
    match value.rsplit_once('.') {
        Some((_, fraction)) => fraction.len() <= MAX_FRACTION_DIGITS,
        None => true,
    }
}

/// Parse an optional feed timestamp, treating absence like an empty string.
pub fn parse_optional(value: Option<&str>) -> Option<NaiveDateTime> {
    value.and_then(parse_timestamp)
}

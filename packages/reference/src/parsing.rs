//! Cell parsing shared by every table loader.
//!
//! Reference exports come from several tools: spreadsheet dumps write `nan` for
//! empty floats, rp5 archives use `dd.mm.yyyy hh:mm`, and some GIS exports
//! use a decimal comma. These helpers accept all of them.

use chrono::{Datelike as _, NaiveDate, NaiveDateTime};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

/// Parses a timestamp in any of the formats seen in the exports. A bare
/// date parses as midnight.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, format) {
            return Some(timestamp);
        }
    }
    parse_date(s).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parses a calendar date.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

/// Parses a finite float, accepting a decimal comma. `nan` and infinities
/// are treated as absent.
#[must_use]
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let value = s
        .parse::<f64>()
        .ok()
        .or_else(|| s.replace(',', ".").parse::<f64>().ok())?;
    value.is_finite().then_some(value)
}

/// Parses an integer, accepting integral floats such as `"30710.0"`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(value) = s.parse::<i64>() {
        return Some(value);
    }
    let value = parse_number(s)?;
    (value.fract() == 0.0 && value.abs() < 9.0e15).then_some(value as i64)
}

/// Parses a year from an integer cell or from a date.
#[must_use]
pub fn parse_year(s: &str) -> Option<i32> {
    parse_integer(s)
        .and_then(|year| i32::try_from(year).ok())
        .or_else(|| parse_timestamp(s).map(|timestamp| timestamp.year()))
}

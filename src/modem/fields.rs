//! Conversions from raw cell text to typed values.
//!
//! Nothing here touches HTML or the network. Malformed input yields `None` or
//! a [`ParseError::CellConversion`], never a panic.

use crate::error::ParseError;
use chrono::NaiveDateTime;
use std::time::Duration;

const SYSTEM_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Parses the modem's uptime string into a duration.
///
/// The device reports uptime as `0 days 00h:01m:55s.00` or
/// `46 days 12h:55m:21s.00`. Anything after the seconds field is ignored.
pub fn parse_uptime(text: &str) -> Option<Duration> {
    let mut tokens = text.split_whitespace();
    let days = parse_digits(tokens.next()?)?;
    if tokens.next()? != "days" {
        return None;
    }

    let clock = tokens.next()?;
    let (hours, rest) = clock.split_once("h:")?;
    let (minutes, rest) = rest.split_once("m:")?;
    let (seconds, _) = rest.split_once('s')?;

    let total = days
        .checked_mul(86_400)?
        .checked_add(parse_digits(hours)?.checked_mul(3_600)?)?
        .checked_add(parse_digits(minutes)?.checked_mul(60)?)?
        .checked_add(parse_digits(seconds)?)?;
    Some(Duration::from_secs(total))
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parses the device clock, e.g. `Tue Mar 12 14:20:59 2024`.
pub fn parse_system_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), SYSTEM_TIME_FORMAT).ok()
}

/// Parses the first whitespace-delimited token of a cell as a number.
///
/// Units trail the value on this device (`363000000 Hz`, `6.2 dBmV`), so the
/// first token is the value.
pub fn leading_number(column: &str, cell: &str) -> Result<f64, ParseError> {
    let token = cell.split_whitespace().next().unwrap_or("");
    token
        .parse::<f64>()
        .map_err(|e| ParseError::cell_conversion(column, cell, e))
}

/// Turns a categorical cell into a label value: uppercase, with separators
/// that are awkward in label values replaced by `_`.
pub fn normalize_label_value(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
        .replace('-', "_")
}

/// Looks up the canonical state for a raw value.
pub fn map_state<'a>(raw: &str, values: &'a [(&'a str, &'a str)], default: &'a str) -> &'a str {
    values
        .iter()
        .find(|(candidate, _)| *candidate == raw)
        .map(|(_, state)| *state)
        .unwrap_or(default)
}

//! HTTP-date parsing and formatting (RFC 7231 section 7.1.1.1).
//!
//! Freshness headers such as `Expires` or `Last-Modified` may carry any of the
//! three historical grammars, so parsing tries them in precedence order:
//!
//! - RFC 1123: `Sun, 06 Nov 1994 08:49:37 GMT`
//! - RFC 850:  `Sunday, 06-Nov-94 08:49:37 GMT`
//! - asctime:  `Sun Nov  6 08:49:37 1994`
//!
//! A value that matches none of them is treated as absent, never as an error.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc, Weekday};
use std::time::SystemTime;

use crate::http::header::HeaderCollection;

const RFC1123_BODY: &str = "%d %b %Y %H:%M:%S";
const ASCTIME_BODY: &str = "%b %e %H:%M:%S %Y";
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Parses an HTTP-date in any of the three accepted grammars.
pub fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    parse_rfc1123(text)
        .or_else(|| parse_rfc850(text))
        .or_else(|| parse_asctime(text))
}

/// Looks up `key` and parses its first value as an HTTP-date.
/// Returns `None` if the header is missing, empty, or not a valid date.
pub fn get_http_date(headers: &HeaderCollection, key: &str) -> Option<DateTime<Utc>> {
    match headers.get(key) {
        Some(value) if !value.is_empty() => parse_http_date(value),
        _ => None,
    }
}

/// Formats a time in the preferred RFC 1123 grammar.
pub fn format_http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).format(RFC1123_FORMAT).to_string()
}

fn parse_rfc1123(s: &str) -> Option<DateTime<Utc>> {
    let (day, rest) = s.split_once(", ")?;
    short_weekday(day)?;
    naive_utc(strip_zone(rest)?, RFC1123_BODY)
}

fn parse_rfc850(s: &str) -> Option<DateTime<Utc>> {
    let (day, rest) = s.split_once(", ")?;
    long_weekday(day)?;
    let (date, clock) = strip_zone(rest)?.split_once(' ')?;

    let mut parts = date.splitn(3, '-');
    let (dd, mon, yy) = (parts.next()?, parts.next()?, parts.next()?);
    if yy.len() != 2 || !yy.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: u32 = yy.parse().ok()?;
    // 69..=99 belongs to the previous century.
    let year = if yy >= 69 { 1900 + yy } else { 2000 + yy };

    naive_utc(&format!("{} {} {} {}", dd, mon, year, clock), RFC1123_BODY)
}

fn parse_asctime(s: &str) -> Option<DateTime<Utc>> {
    let (day, rest) = s.split_once(' ')?;
    short_weekday(day)?;
    naive_utc(rest, ASCTIME_BODY)
}

/// Only the GMT zone is valid in an HTTP-date; UTC is tolerated.
fn strip_zone(s: &str) -> Option<&str> {
    s.strip_suffix(" GMT").or_else(|| s.strip_suffix(" UTC"))
}

// Weekday names are checked for syntax only, not against the calendar date.
fn short_weekday(name: &str) -> Option<Weekday> {
    if name.len() != 3 {
        return None;
    }
    name.parse().ok()
}

fn long_weekday(name: &str) -> Option<Weekday> {
    if name.len() <= 3 {
        return None;
    }
    name.parse().ok()
}

fn naive_utc(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, fmt)
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

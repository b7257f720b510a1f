//! TTL strings and expiry timestamps
//!
//! TTLs are short duration strings like `60s`, `5m`, `8h`, `7d`, `2w`, or
//! the literal `forever`. Expiry timestamps are naive UTC and accepted in
//! three formats, most precise first.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CoreError;

/// Sentinel returned by [`parse_ttl`] for the literal `forever`:
/// the resource never expires.
pub const TTL_FOREVER: i64 = -1;

static TTL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([smhdw])$").unwrap());

/// Unit factors, largest first (also the formatting order)
const FACTOR_TO_TIME_UNIT: &[(i64, char)] = &[
    (60 * 60 * 24 * 7, 'w'),
    (60 * 60 * 24, 'd'),
    (60 * 60, 'h'),
    (60, 'm'),
    (1, 's'),
];

/// Parse a TTL string into seconds.
///
/// `forever` (case-insensitive) yields the negative [`TTL_FOREVER`]
/// sentinel. Leading zeros in the number are allowed (`08s` is 8 seconds).
pub fn parse_ttl(ttl: &str) -> Result<i64, CoreError> {
    if ttl.eq_ignore_ascii_case("forever") {
        return Ok(TTL_FOREVER);
    }

    let caps = TTL_PATTERN
        .captures(ttl)
        .ok_or_else(|| CoreError::InvalidTtl(ttl.to_string()))?;

    let value: i64 = caps[1]
        .parse()
        .map_err(|_| CoreError::InvalidTtl(ttl.to_string()))?;
    let unit = caps[2].chars().next();

    let multiplier = FACTOR_TO_TIME_UNIT
        .iter()
        .find(|(_, u)| Some(*u) == unit)
        .map(|(factor, _)| *factor)
        .ok_or_else(|| CoreError::InvalidTtl(ttl.to_string()))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| CoreError::InvalidTtl(ttl.to_string()))
}

/// Parse an expiry timestamp as naive UTC.
///
/// Tries `YYYY-MM-DDTHH:MM:SSZ`, then `YYYY-MM-DDTHH:MM`, then
/// `YYYY-MM-DD` (midnight); the first successful parse wins.
pub fn parse_expiry(expiry: &str) -> Result<NaiveDateTime, CoreError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(expiry, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(expiry, "%Y-%m-%dT%H:%M") {
        return Ok(ts);
    }
    if let Ok(date) = NaiveDate::parse_from_str(expiry, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(CoreError::InvalidExpiry(expiry.to_string()))
}

/// Render a naive UTC timestamp in the canonical `…Z` form used in
/// events and log messages.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Format a duration in seconds as a human readable string.
///
/// Components are emitted largest-unit-first and zero components are
/// skipped, except that zero itself formats as `0s`. Negative durations
/// get a leading `-` with the absolute value formatting.
///
/// ```
/// # use janitor_core::duration::format_duration;
/// assert_eq!(format_duration(3900), "1h5m");
/// ```
pub fn format_duration(seconds: i64) -> String {
    let mut parts = Vec::new();
    if seconds < 0 {
        parts.push("-".to_string());
    }
    let mut remainder = seconds.saturating_abs();
    for (factor, unit) in FACTOR_TO_TIME_UNIT {
        let value = remainder / factor;
        remainder %= factor;
        if value > 0 || (seconds == 0 && *factor == 1) {
            parts.push(format!("{value}{unit}"));
        }
    }
    parts.concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl() {
        assert!(parse_ttl("foo").is_err());
        assert!(parse_ttl("1y").is_err());
        assert!(parse_ttl("123").is_err());
        assert!(parse_ttl("-5m").is_err());

        assert_eq!(parse_ttl("1s").unwrap(), 1);
        assert_eq!(parse_ttl("08s").unwrap(), 8);
        assert_eq!(parse_ttl("5m").unwrap(), 300);
        assert_eq!(parse_ttl("2h").unwrap(), 3600 * 2);
        assert_eq!(parse_ttl("7d").unwrap(), 3600 * 24 * 7);
        assert_eq!(parse_ttl("1w").unwrap(), 3600 * 24 * 7);
    }

    #[test]
    fn test_parse_ttl_forever() {
        assert!(parse_ttl("forever").unwrap() < 0);
        assert!(parse_ttl("Forever").unwrap() < 0);
        assert_eq!(parse_ttl("FOREVER").unwrap(), TTL_FOREVER);
    }

    #[test]
    fn test_parse_expiry_rejects_other_formats() {
        assert!(parse_expiry("99-06-02T12:12:59").is_err());
        assert!(parse_expiry("2010-12-12 09:26:11").is_err());
        assert!(parse_expiry("123").is_err());
    }

    #[test]
    fn test_parse_expiry_accepted_formats() {
        let full = parse_expiry("2008-09-26T01:51:42Z").unwrap();
        assert_eq!(format_timestamp(full), "2008-09-26T01:51:42Z");

        let minutes = parse_expiry("2008-09-26T01:51").unwrap();
        assert_eq!(format_timestamp(minutes), "2008-09-26T01:51:00Z");

        let date_only = parse_expiry("2008-09-26").unwrap();
        assert_eq!(format_timestamp(date_only), "2008-09-26T00:00:00Z");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(-1), "-1s");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(1), "1s");
        assert_eq!(format_duration(61), "1m1s");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(3900), "1h5m");
        assert_eq!(format_duration(3600 * 25), "1d1h");
        assert_eq!(format_duration(3600 * 24 * 14), "2w");
    }

    #[test]
    fn test_format_duration_round_trips_single_units() {
        for ttl in ["45s", "5m", "8h", "3d", "2w"] {
            let seconds = parse_ttl(ttl).unwrap();
            assert_eq!(format_duration(seconds), ttl);
        }
    }
}

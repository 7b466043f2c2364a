//! Human-readable duration parsing and formatting.
//!
//! Durations are accepted in the form `<number>[ms|s|m|h|d]`. A bare number is
//! interpreted as seconds so that `--sleep 5` keeps meaning five seconds.
use std::time::Duration;

use crate::error::ConfigError;

const MS_SEC: u128 = 1_000;
const MS_MIN: u128 = 60 * MS_SEC;
const MS_HOUR: u128 = 60 * MS_MIN;
const MS_DAY: u128 = 24 * MS_HOUR;
const MS_WEEK: u128 = 7 * MS_DAY;
const MS_YEAR: u128 = 31_557_600_000;

/// Parses a user-facing duration string such as `500ms`, `10s`, `5m` or `2h`.
pub fn parse(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::InvalidDuration(raw.to_string()));
    }

    let (amount, unit_ms) = if let Some(stripped) = value.strip_suffix("ms") {
        (stripped, 1)
    } else if let Some(stripped) = value.strip_suffix('s') {
        (stripped, 1_000)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped, 60_000)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped, 3_600_000)
    } else if let Some(stripped) = value.strip_suffix('d') {
        (stripped, 86_400_000)
    } else {
        (value, 1_000)
    };

    let amount: u64 = amount
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(raw.to_string()))?;

    Ok(Duration::from_millis(amount.saturating_mul(unit_ms)))
}

/// Formats a duration using its largest whole unit, e.g. `500ms`, `5s`, `2w`.
pub fn format_short(duration: Duration) -> String {
    let ms = duration.as_millis();
    let (div, unit) = match ms {
        ms if ms < MS_SEC => (1, "ms"),
        ms if ms < MS_MIN => (MS_SEC, "s"),
        ms if ms < MS_HOUR => (MS_MIN, "m"),
        ms if ms < MS_DAY => (MS_HOUR, "h"),
        ms if ms < MS_WEEK => (MS_DAY, "d"),
        ms if ms < MS_YEAR => (MS_WEEK, "w"),
        _ => (MS_YEAR, "y"),
    };
    format!("{}{}", ms / div, unit)
}

/// Formats a duration in words, e.g. `1 minute`, `3 hours` or `less than one second`.
pub fn format_long(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < MS_SEC {
        return "less than one second".to_string();
    }

    let (div, name) = match ms {
        ms if ms < MS_MIN => (MS_SEC, "second"),
        ms if ms < MS_HOUR => (MS_MIN, "minute"),
        ms if ms < MS_DAY => (MS_HOUR, "hour"),
        ms if ms < MS_WEEK => (MS_DAY, "day"),
        ms if ms < MS_YEAR => (MS_WEEK, "week"),
        _ => (MS_YEAR, "year"),
    };

    let value = ms / div;
    if value == 1 {
        format!("{value} {name}")
    } else {
        format!("{value} {name}s")
    }
}

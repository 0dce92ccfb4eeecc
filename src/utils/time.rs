//! Timestamp parsing and formatting for the device platform.
//!
//! The platform sends validity windows either as RFC 3339 strings or in its
//! own `%Y-%m-%d %H:%M:%S` form, which is interpreted in local time.

use crate::constants::scene::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Parse a deployment timestamp.
///
/// Accepts RFC 3339 (`2026-01-02T03:04:05Z`) or the platform format
/// (`2026-01-02 03:04:05`, local time).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT).map_err(|_| {
        Error::InvalidTimestamp {
            value: value.to_string(),
        }
    })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Format a timestamp the way the platform expects in alarm messages.
pub fn format_platform_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

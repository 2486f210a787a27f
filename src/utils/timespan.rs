//! Parsing of the playtime and timestamp strings Ryujinx writes into
//! `metadata.json`.

use chrono::{DateTime, Utc};

/// Converts a .NET style `[days.]hours:minutes:seconds[.fraction]` timespan into hours.
///
/// Unparseable components count as zero and strings with fewer than three
/// `:` separated parts yield `0.0`.
pub fn parse_timespan_hours(timespan: &str) -> f64 {
    let trimmed = timespan.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 3 {
        return 0.0;
    }

    let (days, hours) = match parts[0].split_once('.') {
        Some((d, h)) => (parse_component(d), parse_component(h)),
        None => (0.0, parse_component(parts[0])),
    };
    let minutes = parse_component(parts[1]);
    let (seconds, fraction) = match parts[2].split_once('.') {
        Some((s, f)) => (
            parse_component(s),
            format!("0.{}", f).parse::<f64>().unwrap_or(0.0),
        ),
        None => (parse_component(parts[2]), 0.0),
    };

    let total_seconds = (days * 24.0 + hours) * 3600.0 + minutes * 60.0 + seconds + fraction;
    total_seconds / 3600.0
}

fn parse_component(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(0.0)
}

/// Parses an ISO-8601 timestamp with or without fractional seconds.
///
/// Empty or malformed values yield `None`.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::debug!("Ignoring unparseable timestamp '{}': {}", value, e);
            None
        }
    }
}

//! Timestamp normalization
//!
//! Records reach the engine from two collaborators: the chat platform (ISO-8601
//! strings) and the member store (epoch milliseconds, or Postgres-style
//! `2024-01-15 10:00:00+00` text). Every form collapses to one UTC instant here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp exactly as a source encoded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch milliseconds
    Millis(i64),
    /// Epoch milliseconds with a fractional part
    FractionalMillis(f64),
    /// Any textual form
    Text(String),
    /// Booleans, objects, arrays; never a time
    Other(serde_json::Value),
}

impl RawTimestamp {
    /// Resolve to a UTC instant, or `None` if the value is not a recognizable time
    pub fn normalize(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            RawTimestamp::FractionalMillis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms.trunc() as i64)
            }
            RawTimestamp::FractionalMillis(_) => None,
            RawTimestamp::Text(text) => parse_instant(text),
            RawTimestamp::Other(_) => None,
        }
    }
}

/// Offset-bearing layouts beyond strict RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Layouts without an offset; interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a textual timestamp.
///
/// Accepts epoch milliseconds written as digits, RFC 3339, space-separated
/// date-times with or without an offset, and bare `yyyy-MM-dd` dates (UTC midnight).
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_epoch_millis(trimmed) {
        return trimmed
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn is_epoch_millis(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

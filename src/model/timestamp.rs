// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

/// A creation time as stored by the backend.
///
/// Server-assigned times arrive as timestamp objects and are authoritative.
/// Client-assigned ones are plain strings or epoch milliseconds and are parsed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Native {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds", alias = "nanos")]
        nanoseconds: u32,
    },
    Millis(f64),
    Text(String),
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

impl RawTimestamp {
    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Native {
                seconds,
                nanoseconds,
            } => DateTime::from_timestamp(*seconds, *nanoseconds),
            RawTimestamp::Millis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms.trunc() as i64)
            }
            RawTimestamp::Millis(_) => None,
            RawTimestamp::Text(text) => parse_text(text.trim()),
        }
    }

    /// Comparable instant for sorting. Unreadable times sort as the epoch,
    /// which puts them at the end of the feed.
    pub fn normalize(raw: Option<&RawTimestamp>) -> DateTime<Utc> {
        raw.and_then(RawTimestamp::to_instant)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

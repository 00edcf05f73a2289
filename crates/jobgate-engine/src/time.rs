//! UTC timestamp helpers
//!
//! Every timestamp that crosses the wire is zero-padded, second-precision and
//! UTC-normalized, so lexicographic order matches chronological order.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Compact form allowed by the step schema pattern (no separators)
const COMPACT_FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a requested start time. Offsets are normalized to UTC and
/// sub-second precision is dropped.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc).trunc_subsecs(0));
    }

    NaiveDateTime::parse_from_str(value, COMPACT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapter for `DateTime<Utc>` fields stored in `TIMESTAMP_FORMAT`
pub mod timestamp {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

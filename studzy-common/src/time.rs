//! Timestamp utilities
//!
//! Activity and streak tracking works in whole UTC days. Days are stored as
//! `YYYY-MM-DD` strings so they sort and compare lexically.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Day key (`YYYY-MM-DD`) for a timestamp
pub fn day_key(at: DateTime<Utc>) -> String {
    at.date_naive().format("%Y-%m-%d").to_string()
}

/// Parse a day key back into a date
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// Whether `at` is older than `max_age_secs` relative to `reference`
pub fn is_stale(at: DateTime<Utc>, reference: DateTime<Utc>, max_age_secs: i64) -> bool {
    reference - at > Duration::seconds(max_age_secs)
}

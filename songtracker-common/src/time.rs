//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix epoch milliseconds to an RFC 3339 string
///
/// Out-of-range values render as the epoch.
pub fn millis_to_rfc3339(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339()
}

/// Convert hours to a duration
pub fn hours_to_duration(hours: u64) -> std::time::Duration {
    std::time::Duration::from_secs(hours * 60 * 60)
}

use chrono::{TimeZone, Utc};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Renders epoch milliseconds as RFC 3339, or the raw number when out of range.
pub fn format_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts.to_rfc3339(),
        None => millis.to_string(),
    }
}

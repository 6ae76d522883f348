//! Timestamp utilities

use chrono::{DateTime, Datelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current calendar year (UTC)
pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Whole days elapsed from `earlier` to `later`, floored at zero
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u32 {
    let days = (later - earlier).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

//! Due-time arithmetic and the website downtime debounce.

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::db::entities::uptime_check_result;

/// Consecutive failed checks needed before a website is declared down.
pub const DOWNTIME_STRIKES: usize = 3;

pub fn floor_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::minutes(1)).unwrap_or(at)
}

/// Next website check: the current minute boundary plus the poll interval.
pub fn next_website_check(now: DateTime<Utc>, interval_minutes: i32) -> DateTime<Utc> {
    floor_to_minute(now) + Duration::minutes(i64::from(interval_minutes))
}

pub fn heartbeat_next_due(
    pinged_at: DateTime<Utc>,
    interval_seconds: i32,
    grace_seconds: i32,
) -> DateTime<Utc> {
    pinged_at + Duration::seconds(i64::from(interval_seconds) + i64::from(grace_seconds))
}

/// True when the newest `DOWNTIME_STRIKES` results all failed.
pub fn confirms_downtime(recent: &[uptime_check_result::Model]) -> bool {
    recent.len() >= DOWNTIME_STRIKES
        && recent
            .iter()
            .take(DOWNTIME_STRIKES)
            .all(|result| !result.is_passed())
}

/// Renders a duration in its largest whole unit, e.g. "1 day" or "5 minutes".
pub fn format_interval(seconds: i64) -> String {
    let (count, unit) = if seconds >= 86_400 {
        (seconds / 86_400, "day")
    } else if seconds >= 3_600 {
        (seconds / 3_600, "hour")
    } else if seconds >= 60 {
        (seconds / 60, "minute")
    } else {
        (seconds, "second")
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural}")
}

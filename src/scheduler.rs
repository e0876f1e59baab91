use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

use crate::error::{AppError, Result};

/// Parses `HH:MM`.
pub fn parse_daily_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| AppError::Config(format!("invalid time '{}' (expected HH:MM): {}", value, e)))
}

pub fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::Config(format!("invalid UTC offset: {} hours", hours)))
}

/// The first instant strictly after `now` whose wall-clock time in `offset` is `time`.
pub fn next_run_after(now: DateTime<Utc>, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local_now = now.with_timezone(&offset);
    let today = local_now.date_naive().and_time(time);

    let candidate = (today - Duration::seconds(offset.local_minus_utc() as i64)).and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

//! Notification-time matching.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::ChronikosError;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Parse a `HH:MM` preference (a trailing `:SS` is tolerated and ignored).
pub fn parse_notification_time(raw: &str) -> Result<NaiveTime, ChronikosError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(|t| t.with_second(0).unwrap_or(t))
        .map_err(|_| ChronikosError::InvalidInput(format!("invalid notification time: {raw:?}")))
}

pub fn parse_timezone(raw: &str) -> Result<Tz, ChronikosError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| ChronikosError::InvalidInput(format!("unknown timezone: {raw:?}")))
}

/// The user's calendar date at `now`; daily facts are keyed by it.
pub fn local_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The local date of the preferred-time occurrence whose window contains `now`, if any.
///
/// The difference wraps at midnight, so a 23:58 preference is still due at 00:01,
/// and that run belongs to the day the window opened on.
pub fn due_date(
    tz: Tz,
    preferred: NaiveTime,
    now: DateTime<Utc>,
    window_minutes: u32,
) -> Option<NaiveDate> {
    let local = now.with_timezone(&tz).naive_local();
    let local_min = i64::from(local.hour() * 60 + local.minute());
    let pref_min = i64::from(preferred.hour() * 60 + preferred.minute());
    let diff = (local_min - pref_min).rem_euclid(MINUTES_PER_DAY);
    (diff <= i64::from(window_minutes)).then(|| (local - Duration::minutes(diff)).date())
}

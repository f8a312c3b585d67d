//! Time utilities: timezone lookup and countdown formatting for display.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Parse an IANA timezone like "America/Chicago".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Wall-clock time in `tz`, e.g. "14:05".
pub fn format_local_time(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%H:%M").to_string()
}

/// Long-form date in `tz`, e.g. "Thursday, February 19".
pub fn format_local_date(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%A, %B %-d").to_string()
}

/// Remaining time as "HH:MM:SS". Hours are not wrapped at 24.
/// Elapsed or zero durations render as "00:00:00".
pub fn format_countdown(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "00:00:00".to_string();
    }
    let secs = remaining.num_seconds();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Coarse "in 1d 2h 3m" / "in 2h 3m" / "in 3m". Empty once elapsed.
pub fn format_until(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return String::new();
    }
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;

    if days > 0 {
        format!("in {days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("in {hours}h {minutes}m")
    } else {
        format!("in {minutes}m")
    }
}

/// Share of `[start, end)` elapsed at `now`, as a whole percent in 0..=100.
/// A window with no length counts as finished.
pub fn progress_percent(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
    let span = (end - start).num_seconds();
    if span <= 0 {
        return 100;
    }
    let elapsed = (now - start).num_seconds().clamp(0, span);
    (elapsed * 100 / span) as u8
}

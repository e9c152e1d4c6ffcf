//! Formatting helpers for listings.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    format_relative_time_at(ts, Utc::now())
}

/// Relative time of `ts` as seen from `now`.
pub fn format_relative_time_at(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d, %Y").to_string()
    }
}

/// Relative time of a driver's creation, or "-" when unknown.
pub fn format_relative_time_opt(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts),
        None => "-".to_string(),
    }
}

/// Event date as stored on new events ("March 1, 2025").
pub fn event_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%B %-d, %Y").to_string()
}

/// Event time as stored on new events ("2:05 PM").
pub fn event_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%-I:%M %p").to_string()
}

/// Normalize an event's stored date for display.
///
/// Older events store ISO dates or full timestamps; those are rewritten in
/// the "March 1, 2025" form. Anything unrecognized is shown as stored.
pub fn display_date(raw: &str) -> String {
    let raw = raw.trim();
    if NaiveDate::parse_from_str(raw, "%B %d, %Y").is_ok() {
        return raw.to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%B %-d, %Y").to_string();
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return event_date(&ts.with_timezone(&Local));
    }
    raw.to_string()
}

/// Normalize an event's stored time for display ("2:05 PM").
pub fn display_time(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "N/A".to_string();
    }
    if NaiveTime::parse_from_str(raw, "%I:%M %p").is_ok() {
        return raw.to_string();
    }
    for pattern in ["%H:%M:%S", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(raw, pattern) {
            return time.format("%-I:%M %p").to_string();
        }
    }
    raw.to_string()
}

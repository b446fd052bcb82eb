//! Timestamp helpers for rate snapshots.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Format stamped on freshly fetched snapshots (`HH:mm:ss dd.MM.yyyy`).
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%H:%M:%S %d.%m.%Y";

/// Render a timestamp with a chrono format.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(format).to_string()
}

/// Current local time rendered with a caller supplied chrono format.
pub fn local_timestamp(format: &str) -> String {
    format_timestamp(&Local::now(), format)
}

/// Check that a chrono format string contains no invalid specifiers.
pub fn is_valid_timestamp_format(format: &str) -> bool {
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Parse a snapshot timestamp back into a naive local date-time.
pub fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIMESTAMP_FORMAT).ok()
}

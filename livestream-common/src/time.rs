//! Timing timestamp helpers
//!
//! Hardware punches carry a local wall-clock time with millisecond precision.
//! The same textual layout is used on disk, in the database and in the mirror,
//! so lexical order equals chronological order.

use chrono::NaiveDateTime;

/// chrono format string for `YYYY-MM-DD HH:MM:SS.mmm`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S.%3f";

/// Parse a punch timestamp
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
}

/// Format a punch timestamp for storage and display
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

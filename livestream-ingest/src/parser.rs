//! Timing log line parser
//!
//! A timing log line is tab-separated:
//!
//! ```text
//! <bib>\t<YYYY-MM-DD HH:MM:SS.mmm>\t<antenna row?>\t<antenna?>
//! ```
//!
//! Bib and timestamp are required. The two trailing fields are optional: an
//! empty or missing field is absent, a present field must be an integer.
//! Bad lines are rejected one at a time and never abort the batch.
//!
//! The timing software appends while we read, so a final line without a
//! trailing newline may be half written. It is held back unparsed; once the
//! newline lands, a later pass reads it whole.

use chrono::NaiveDateTime;
use livestream_common::time::{format_timestamp, parse_timestamp};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// One raw hardware punch read from the timing log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Punch {
    pub bib_number: i64,
    pub timestamp: NaiveDateTime,
    pub antenna_row: Option<i64>,
    pub antenna: Option<i64>,
}

impl Punch {
    /// Timestamp in the stored text layout
    pub fn timestamp_text(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// Why a line was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineRejection {
    #[error("fewer than two tab-separated fields")]
    TooFewFields,

    #[error("malformed bib number {0:?}")]
    MalformedBib(String),

    #[error("malformed timestamp {0:?}")]
    MalformedTimestamp(String),

    #[error("malformed {field} {value:?}")]
    MalformedOptional { field: &'static str, value: String },
}

/// A rejected line and its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line_number: usize,
    pub reason: LineRejection,
}

/// Result of parsing a whole timing log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContent {
    /// Accepted punches in file order
    pub punches: Vec<Punch>,
    pub rejected: Vec<RejectedLine>,
    /// Line number of an unterminated final line left for a later pass
    pub held_back: Option<usize>,
}

/// Parse a single timing log line
pub fn parse_line(line: &str) -> Result<Punch, LineRejection> {
    let line = line.trim_end_matches('\r');
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 2 {
        return Err(LineRejection::TooFewFields);
    }

    let bib_number = fields[0]
        .parse::<i64>()
        .map_err(|_| LineRejection::MalformedBib(fields[0].to_string()))?;

    let timestamp = parse_timestamp(fields[1])
        .map_err(|_| LineRejection::MalformedTimestamp(fields[1].to_string()))?;

    let antenna_row = parse_optional_int(fields.get(2).copied(), "antenna row")?;
    let antenna = parse_optional_int(fields.get(3).copied(), "antenna")?;

    Ok(Punch {
        bib_number,
        timestamp,
        antenna_row,
        antenna,
    })
}

/// Missing and empty both decode to None
fn parse_optional_int(
    field: Option<&str>,
    name: &'static str,
) -> Result<Option<i64>, LineRejection> {
    match field {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| LineRejection::MalformedOptional {
                field: name,
                value: value.to_string(),
            }),
    }
}

/// Parse every complete line of a timing log, skipping rejected lines
pub fn parse_content(content: &str) -> ParsedContent {
    let mut parsed = ParsedContent::default();

    for (index, raw) in content.split_inclusive('\n').enumerate() {
        let line_number = index + 1;
        let Some(line) = raw.strip_suffix('\n') else {
            debug!(line_number, "Holding back unterminated final line");
            parsed.held_back = Some(line_number);
            break;
        };

        match parse_line(line) {
            Ok(punch) => parsed.punches.push(punch),
            Err(reason) => {
                match reason {
                    LineRejection::TooFewFields => {
                        debug!(line_number, "Ignoring line with fewer than two fields");
                    }
                    _ => {
                        warn!(line_number, reason = %reason, "Skipping malformed timing line");
                    }
                }
                parsed.rejected.push(RejectedLine { line_number, reason });
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_parse_full_line() {
        let punch = parse_line("123\t2024-01-01 10:00:00.500\t2\t5").unwrap();
        assert_eq!(punch.bib_number, 123);
        assert_eq!(
            punch.timestamp.date(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(punch.timestamp.hour(), 10);
        assert_eq!(punch.timestamp.nanosecond(), 500_000_000);
        assert_eq!(punch.antenna_row, Some(2));
        assert_eq!(punch.antenna, Some(5));
    }

    #[test]
    fn test_empty_optional_fields_are_absent() {
        let punch = parse_line("123\t2024-01-01 10:00:00.500\t\t").unwrap();
        assert_eq!(punch.antenna_row, None);
        assert_eq!(punch.antenna, None);
    }

    #[test]
    fn test_missing_optional_fields_are_absent() {
        let punch = parse_line("7\t2024-01-01 10:00:00.000").unwrap();
        assert_eq!(punch.bib_number, 7);
        assert_eq!(punch.antenna_row, None);
        assert_eq!(punch.antenna, None);

        let punch = parse_line("7\t2024-01-01 10:00:00.000\t3").unwrap();
        assert_eq!(punch.antenna_row, Some(3));
        assert_eq!(punch.antenna, None);
    }

    #[test]
    fn test_optional_fields_independent() {
        let punch = parse_line("7\t2024-01-01 10:00:00.000\t\t4").unwrap();
        assert_eq!(punch.antenna_row, None);
        assert_eq!(punch.antenna, Some(4));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let punch = parse_line("7\t2024-01-01 10:00:00.000\t1\t2\tnoise").unwrap();
        assert_eq!(punch.antenna, Some(2));
    }

    #[test]
    fn test_crlf_line_ending_stripped() {
        let punch = parse_line("7\t2024-01-01 10:00:00.000\t1\t2\r").unwrap();
        assert_eq!(punch.antenna, Some(2));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            parse_line("abc\t2024-01-01 10:00:00.500\t2\t5"),
            Err(LineRejection::MalformedBib("abc".to_string()))
        );
        assert_eq!(
            parse_line("12\t2024-01-01 10:00\t2\t5"),
            Err(LineRejection::MalformedTimestamp("2024-01-01 10:00".to_string()))
        );
        assert_eq!(
            parse_line("12\t2024-01-01 10:00:00.500\tx\t5"),
            Err(LineRejection::MalformedOptional {
                field: "antenna row",
                value: "x".to_string()
            })
        );
        assert_eq!(
            parse_line("12\t2024-01-01 10:00:00.500\t2\t5.5"),
            Err(LineRejection::MalformedOptional {
                field: "antenna",
                value: "5.5".to_string()
            })
        );
        assert_eq!(parse_line("12"), Err(LineRejection::TooFewFields));
        assert_eq!(parse_line(""), Err(LineRejection::TooFewFields));
    }

    #[test]
    fn test_bad_line_does_not_abort_batch() {
        let content = "1\t2024-01-01 10:00:00.100\t1\t1\n\
                       abc\t2024-01-01 10:00:00.200\t1\t1\n\
                       \n\
                       2\t2024-01-01 10:00:00.300\t\t\n";
        let parsed = parse_content(content);

        assert_eq!(parsed.punches.len(), 2);
        assert_eq!(parsed.punches[0].bib_number, 1);
        assert_eq!(parsed.punches[1].bib_number, 2);
        assert_eq!(parsed.punches[1].timestamp, ts("2024-01-01 10:00:00.300"));

        let rejected_lines: Vec<usize> = parsed.rejected.iter().map(|r| r.line_number).collect();
        assert_eq!(rejected_lines, vec![2, 3]);
    }

    #[test]
    fn test_unterminated_final_line_held_back() {
        let partial = "1\t2024-01-01 10:00:00.100\t1\t1\n123\t2024-01-01 10:00:00.500\t1";
        let parsed = parse_content(partial);
        assert_eq!(parsed.punches.len(), 1);
        assert_eq!(parsed.punches[0].bib_number, 1);
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.held_back, Some(2));

        // The writer finishes the line
        let complete = format!("{}2\t5\n", partial);
        let parsed = parse_content(&complete);
        assert_eq!(parsed.held_back, None);
        assert_eq!(parsed.punches.len(), 2);
        assert_eq!(parsed.punches[1].bib_number, 123);
        assert_eq!(parsed.punches[1].antenna_row, Some(12));
        assert_eq!(parsed.punches[1].antenna, Some(5));
    }

    #[test]
    fn test_empty_content_has_nothing_held_back() {
        assert_eq!(parse_content(""), ParsedContent::default());
    }

    #[test]
    fn test_reparse_is_deterministic() {
        let content = "5\t2024-01-01 10:00:01.000\t1\t2\n6\t2024-01-01 10:00:02.000\t\t\n";
        assert_eq!(parse_content(content), parse_content(content));
    }

    #[test]
    fn test_timestamp_text_matches_source() {
        let punch = parse_line("5\t2024-01-01 10:00:01.040").unwrap();
        assert_eq!(punch.timestamp_text(), "2024-01-01 10:00:01.040");
    }
}

//! Roster import
//!
//! Registers participants from spreadsheet-style rows under a primary event.
//! Each row is decoded once into a typed `RosterEntry`, or rejected with a
//! `RowRejection`; nothing downstream inspects raw cell values.
//!
//! Column layout:
//!
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 |
//! |---|---|---|---|---|---|---|
//! | bib | first name | last name | birthdate | club | classification | gender |
//!
//! A participant with a classification goes into the sub-event
//! `"<primary> <classification>"`, which is created under the primary event
//! the first time it is needed and reused afterwards.

use crate::db::{self, RegistrationOutcome};
use livestream_common::db::{Event, Gender, NewParticipant, UNASSIGNED_EVENT_NAME};
use livestream_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

/// Minimum number of cells in a roster row
pub const ROSTER_COLUMNS: usize = 7;

/// Why a roster row was not imported
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("expected at least 7 columns, found {0}")]
    TooFewColumns(usize),

    #[error("invalid bib number {0}")]
    InvalidBib(String),

    #[error("{0} must be a text value")]
    NotText(&'static str),
}

/// A decoded roster row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub bib_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: String,
    pub club: Option<String>,
    pub classification: Option<String>,
    pub gender: Gender,
}

impl RosterEntry {
    fn to_new_participant(&self) -> NewParticipant {
        NewParticipant {
            bib_number: self.bib_number,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            gender: self.gender,
            birthdate: self.birthdate.clone(),
            club: self.club.clone(),
            classification: self.classification.clone(),
        }
    }
}

fn decode_bib(value: &Value) -> Result<i64, RowRejection> {
    let invalid = || RowRejection::InvalidBib(value.to_string());
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(bib), _) => Ok(bib),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err(invalid()),
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn decode_text(value: &Value, column: &'static str) -> Result<String, RowRejection> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(RowRejection::NotText(column)),
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode one roster row
pub fn decode_row(row: &[Value]) -> Result<RosterEntry, RowRejection> {
    let bib_number = decode_bib(row.first().unwrap_or(&Value::Null))?;
    if row.len() < ROSTER_COLUMNS {
        return Err(RowRejection::TooFewColumns(row.len()));
    }

    Ok(RosterEntry {
        bib_number,
        first_name: decode_text(&row[1], "first name")?,
        last_name: decode_text(&row[2], "last name")?,
        birthdate: decode_text(&row[3], "birthdate")?,
        club: non_empty(decode_text(&row[4], "club")?),
        classification: non_empty(decode_text(&row[5], "classification")?),
        gender: Gender::normalize(&decode_text(&row[6], "gender")?),
    })
}

/// Per-row import result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Inserted {
        participant_id: i64,
        bib_number: i64,
        event_name: String,
    },
    AlreadyRegistered {
        bib_number: i64,
        event_name: String,
    },
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOutcome {
    /// 0-based position in the submitted rows
    pub row_index: usize,
    #[serde(flatten)]
    pub status: RowStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub primary_event: Event,
    pub inserted: usize,
    pub already_registered: usize,
    pub rejected: usize,
    pub rows: Vec<RowOutcome>,
}

/// Name of the sub-event for a classification
pub fn sub_event_name(primary_event_name: &str, classification: &str) -> String {
    format!("{} {}", primary_event_name, classification)
}

/// Register roster rows under `primary_event_name`
///
/// Row problems are reported per row. Storage failures abort the import.
pub async fn import_participants(
    pool: &SqlitePool,
    rows: &[Vec<Value>],
    primary_event_name: &str,
) -> Result<ImportReport> {
    let primary_event_name = primary_event_name.trim();
    if primary_event_name.is_empty() {
        return Err(Error::InvalidInput("primary event name is required".to_string()));
    }
    if primary_event_name == UNASSIGNED_EVENT_NAME {
        return Err(Error::InvalidInput(format!(
            "{:?} is reserved",
            UNASSIGNED_EVENT_NAME
        )));
    }

    let primary = db::ensure_event(pool, primary_event_name, None, None).await?;
    info!(
        event_id = primary.event_id,
        event_name = %primary.event_name,
        rows = rows.len(),
        "Importing participants"
    );

    let mut report = ImportReport {
        primary_event: primary.clone(),
        inserted: 0,
        already_registered: 0,
        rejected: 0,
        rows: Vec::with_capacity(rows.len()),
    };

    for (row_index, row) in rows.iter().enumerate() {
        let status = match decode_row(row) {
            Ok(entry) => register(pool, &primary, &entry).await?,
            Err(rejection) => {
                debug!(row_index, reason = %rejection, "Skipping roster row");
                RowStatus::Rejected {
                    reason: rejection.to_string(),
                }
            }
        };

        match status {
            RowStatus::Inserted { .. } => report.inserted += 1,
            RowStatus::AlreadyRegistered { .. } => report.already_registered += 1,
            RowStatus::Rejected { .. } => report.rejected += 1,
        }
        report.rows.push(RowOutcome { row_index, status });
    }

    info!(
        inserted = report.inserted,
        already_registered = report.already_registered,
        rejected = report.rejected,
        "Participant import complete"
    );

    Ok(report)
}

async fn register(pool: &SqlitePool, primary: &Event, entry: &RosterEntry) -> Result<RowStatus> {
    let event = match &entry.classification {
        Some(classification) => {
            db::ensure_event(
                pool,
                &sub_event_name(&primary.event_name, classification),
                Some(primary.event_id),
                Some(classification),
            )
            .await?
        }
        None => primary.clone(),
    };

    Ok(
        match db::insert_participant(pool, event.event_id, &entry.to_new_participant()).await? {
            RegistrationOutcome::Inserted(participant) => RowStatus::Inserted {
                participant_id: participant.participant_id,
                bib_number: participant.bib_number,
                event_name: event.event_name,
            },
            RegistrationOutcome::AlreadyRegistered => RowStatus::AlreadyRegistered {
                bib_number: entry.bib_number,
                event_name: event.event_name,
            },
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cells(values: Value) -> Vec<Value> {
        values.as_array().unwrap().clone()
    }

    #[test]
    fn test_decode_string_row() {
        let row = cells(json!(["101", "Anna", "Svensson", "1990-04-02", "IK Stål", "D35", "Kvinna"]));
        let entry = decode_row(&row).unwrap();
        assert_eq!(entry.bib_number, 101);
        assert_eq!(entry.first_name, "Anna");
        assert_eq!(entry.club.as_deref(), Some("IK Stål"));
        assert_eq!(entry.classification.as_deref(), Some("D35"));
        assert_eq!(entry.gender, Gender::Female);
    }

    #[test]
    fn test_decode_numeric_bib() {
        let row = cells(json!([7, "Bo", "Ek", "1980", "", "H40", "M"]));
        let entry = decode_row(&row).unwrap();
        assert_eq!(entry.bib_number, 7);
        assert_eq!(entry.club, None);
        assert_eq!(entry.gender, Gender::Male);

        let row = cells(json!([8.0, "Bo", "Ek", "1980", "", "H40", "M"]));
        assert_eq!(decode_row(&row).unwrap().bib_number, 8);
    }

    #[test]
    fn test_header_row_rejected() {
        let row = cells(json!(["Startnr", "Förnamn", "Efternamn", "Född", "Förening", "Klass", "Kön"]));
        assert!(matches!(decode_row(&row), Err(RowRejection::InvalidBib(_))));
    }

    #[test]
    fn test_fractional_bib_rejected() {
        let row = cells(json!([8.5, "Bo", "Ek", "1980", "", "H40", "M"]));
        assert!(matches!(decode_row(&row), Err(RowRejection::InvalidBib(_))));
    }

    #[test]
    fn test_short_and_empty_rows_rejected() {
        assert!(matches!(
            decode_row(&cells(json!(["12", "Bo", "Ek"]))),
            Err(RowRejection::TooFewColumns(3))
        ));
        assert!(matches!(decode_row(&[]), Err(RowRejection::InvalidBib(_))));
    }

    #[test]
    fn test_non_text_cell_rejected() {
        let row = cells(json!(["12", ["Bo"], "Ek", "1980", "", "H40", "M"]));
        assert_eq!(decode_row(&row), Err(RowRejection::NotText("first name")));
    }

    #[test]
    fn test_unknown_gender_kept_empty() {
        let row = cells(json!(["12", "Bo", "Ek", "1980", "", "H40", "X"]));
        assert_eq!(decode_row(&row).unwrap().gender, Gender::Unknown);
    }

    #[test]
    fn test_sub_event_name() {
        assert_eq!(sub_event_name("Vårruset", "D35"), "Vårruset D35");
    }
}

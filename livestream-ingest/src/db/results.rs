//! Timing result persistence
//!
//! (bib_number, event_id, timestamp) is the idempotence key. The whole timing
//! log is re-read on every change, so every punch is presented again and
//! again; a UNIQUE violation here is the normal signal of a repeat delivery.

use crate::parser::Punch;
use livestream_common::db::{Participant, ResultRow, UNASSIGNED_EVENT_ID};
use livestream_common::time::parse_timestamp;
use livestream_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Outcome of storing one punch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Same (bib, event, timestamp) already stored; nothing written
    Duplicate,
}

/// Timestamp ordering for result queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Newest => "DESC",
            SortOrder::Oldest => "ASC",
        }
    }
}

/// Store a punch, keyed by the participant's event
///
/// Unresolved punches are stored under the unassigned event so raw timing
/// data is never dropped for lack of roster data.
pub async fn upsert_result(
    pool: &SqlitePool,
    punch: &Punch,
    participant: Option<&Participant>,
) -> Result<UpsertOutcome> {
    let event_id = participant.map_or(UNASSIGNED_EVENT_ID, |p| p.event_id);

    let inserted = sqlx::query(
        r#"
        INSERT INTO timing_results (bib_number, event_id, timestamp, antenna_row, antenna, placement)
        VALUES (?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(punch.bib_number)
    .bind(event_id)
    .bind(punch.timestamp_text())
    .bind(punch.antenna_row)
    .bind(punch.antenna)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => Ok(UpsertOutcome::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(UpsertOutcome::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

/// Most recent results joined with participant display fields
pub async fn latest_results(
    pool: &SqlitePool,
    limit: i64,
    order: SortOrder,
) -> Result<Vec<ResultRow>> {
    let sql = format!(
        r#"
        SELECT r.bib_number, r.event_id, r.timestamp, r.antenna_row, r.antenna, r.placement,
               p.first_name, p.last_name, p.club, p.birthdate
        FROM timing_results r
        LEFT JOIN participants p
            ON p.bib_number = r.bib_number AND p.event_id = r.event_id
        ORDER BY r.timestamp {order}, r.id {order}
        LIMIT ?
        "#,
        order = order.sql()
    );

    let rows = sqlx::query(&sql)
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| -> Result<ResultRow> {
            let timestamp: String = row.try_get("timestamp")?;
            let timestamp = parse_timestamp(&timestamp).map_err(|e| {
                Error::Internal(format!("stored timestamp {:?} unreadable: {}", timestamp, e))
            })?;

            Ok(ResultRow {
                bib_number: row.try_get("bib_number")?,
                event_id: row.try_get("event_id")?,
                timestamp,
                antenna_row: row.try_get("antenna_row")?,
                antenna: row.try_get("antenna")?,
                placement: row.try_get("placement")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                club: row.try_get("club")?,
                birthdate: row.try_get("birthdate")?,
            })
        })
        .collect()
}

/// Total number of stored timing results
pub async fn count_results(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timing_results")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

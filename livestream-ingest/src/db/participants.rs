//! Participant persistence
//!
//! Participants are registered during roster import and never changed
//! afterwards. (bib_number, event_id) is unique.

use livestream_common::db::{Gender, NewParticipant, Participant};
use livestream_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// Result of a participant registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Inserted(Participant),
    /// The bib is already registered for this event
    AlreadyRegistered,
}

fn row_to_participant(row: &SqliteRow) -> Result<Participant> {
    let gender: String = row.try_get("gender")?;
    Ok(Participant {
        participant_id: row.try_get("participant_id")?,
        event_id: row.try_get("event_id")?,
        bib_number: row.try_get("bib_number")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        gender: Gender::from_code(&gender),
        birthdate: row.try_get("birthdate")?,
        club: row.try_get("club")?,
        classification: row.try_get("classification")?,
    })
}

/// Register a participant in an event
pub async fn insert_participant(
    pool: &SqlitePool,
    event_id: i64,
    participant: &NewParticipant,
) -> Result<RegistrationOutcome> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO participants
            (event_id, bib_number, first_name, last_name, gender, birthdate, club, classification)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event_id)
    .bind(participant.bib_number)
    .bind(&participant.first_name)
    .bind(&participant.last_name)
    .bind(participant.gender.as_code())
    .bind(&participant.birthdate)
    .bind(&participant.club)
    .bind(&participant.classification)
    .execute(pool)
    .await;

    match inserted {
        Ok(done) => Ok(RegistrationOutcome::Inserted(Participant {
            participant_id: done.last_insert_rowid(),
            event_id,
            bib_number: participant.bib_number,
            first_name: participant.first_name.clone(),
            last_name: participant.last_name.clone(),
            gender: participant.gender,
            birthdate: participant.birthdate.clone(),
            club: participant.club.clone(),
            classification: participant.classification.clone(),
        })),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(RegistrationOutcome::AlreadyRegistered)
        }
        Err(e) => Err(e.into()),
    }
}

/// Point lookup of a participant by bib number
///
/// When several events register the same bib the earliest registration wins.
pub async fn participant_by_bib(pool: &SqlitePool, bib_number: i64) -> Result<Option<Participant>> {
    let row = sqlx::query(
        r#"
        SELECT participant_id, event_id, bib_number, first_name, last_name,
               gender, birthdate, club, classification
        FROM participants
        WHERE bib_number = ?
        ORDER BY participant_id
        LIMIT 1
        "#,
    )
    .bind(bib_number)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_participant).transpose()
}

/// All participants grouped by event name, ordered by bib within each event
pub async fn list_participants_by_event(
    pool: &SqlitePool,
) -> Result<BTreeMap<String, Vec<Participant>>> {
    let rows = sqlx::query(
        r#"
        SELECT p.participant_id, p.event_id, p.bib_number, p.first_name, p.last_name,
               p.gender, p.birthdate, p.club, p.classification, e.event_name
        FROM participants p
        JOIN events e ON e.event_id = p.event_id
        ORDER BY e.event_name, p.bib_number
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut grouped: BTreeMap<String, Vec<Participant>> = BTreeMap::new();
    for row in &rows {
        let event_name: String = row.try_get("event_name")?;
        grouped
            .entry(event_name)
            .or_default()
            .push(row_to_participant(row)?);
    }

    Ok(grouped)
}

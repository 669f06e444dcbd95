//! Event persistence
//!
//! Events form a two-level tree: a primary event and its classification
//! sub-events. Names are globally unique.

use livestream_common::db::Event;
use livestream_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

fn row_to_event(row: &SqliteRow) -> Result<Event> {
    Ok(Event {
        event_id: row.try_get("event_id")?,
        event_name: row.try_get("event_name")?,
        parent_event_id: row.try_get("parent_event_id")?,
        classification: row.try_get("classification")?,
    })
}

/// Look up an event by its unique name
pub async fn event_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Event>> {
    let row = sqlx::query(
        r#"
        SELECT event_id, event_name, parent_event_id, classification
        FROM events
        WHERE event_name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_event).transpose()
}

/// Look up an event by id
pub async fn event_by_id(pool: &SqlitePool, event_id: i64) -> Result<Option<Event>> {
    let row = sqlx::query(
        r#"
        SELECT event_id, event_name, parent_event_id, classification
        FROM events
        WHERE event_id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_event).transpose()
}

/// All events ordered by id
pub async fn list_events(pool: &SqlitePool) -> Result<Vec<Event>> {
    let rows = sqlx::query(
        "SELECT event_id, event_name, parent_event_id, classification FROM events ORDER BY event_id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_event).collect()
}

/// Create an event
///
/// The parent, when given, must already exist. A name that is already taken
/// yields `Error::Conflict`; two resolution passes racing to create the same
/// event end up here and the loser is expected to re-read.
pub async fn create_event(
    pool: &SqlitePool,
    name: &str,
    parent_event_id: Option<i64>,
    classification: Option<&str>,
) -> Result<Event> {
    if let Some(parent_id) = parent_event_id {
        if event_by_id(pool, parent_id).await?.is_none() {
            return Err(Error::NotFound(format!("parent event {}", parent_id)));
        }
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO events (event_name, parent_event_id, classification)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(parent_event_id)
    .bind(classification)
    .execute(pool)
    .await;

    match inserted {
        Ok(done) => {
            let event = Event {
                event_id: done.last_insert_rowid(),
                event_name: name.to_string(),
                parent_event_id,
                classification: classification.map(str::to_string),
            };
            debug!(event_id = event.event_id, event_name = %name, "Created event");
            Ok(event)
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(Error::Conflict(format!("event {:?} already exists", name)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Find an event by name, creating it when missing
///
/// A create conflict means another writer won the race; it is logged and the
/// winner's row is returned.
pub async fn ensure_event(
    pool: &SqlitePool,
    name: &str,
    parent_event_id: Option<i64>,
    classification: Option<&str>,
) -> Result<Event> {
    if let Some(event) = event_by_name(pool, name).await? {
        return Ok(event);
    }

    match create_event(pool, name, parent_event_id, classification).await {
        Ok(event) => Ok(event),
        Err(Error::Conflict(msg)) => {
            warn!(event_name = %name, "Event create conflict, reusing existing row: {}", msg);
            event_by_name(pool, name)
                .await?
                .ok_or_else(|| Error::Internal(format!("event {:?} vanished after conflict", name)))
        }
        Err(e) => Err(e),
    }
}

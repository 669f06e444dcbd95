//! Database initialization
//!
//! Opens (or creates) the SQLite database and makes sure the schema exists.
//! Every statement is idempotent so this runs on each startup.

use crate::db::models::{UNASSIGNED_EVENT_ID, UNASSIGNED_EVENT_NAME};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Applied to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables, indexes and the reserved unassigned event
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_events_table(pool).await?;
    create_participants_table(pool).await?;
    create_timing_results_table(pool).await?;
    seed_unassigned_event(pool).await?;
    Ok(())
}

async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            event_id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_name TEXT NOT NULL UNIQUE,
            parent_event_id INTEGER,
            classification TEXT,
            FOREIGN KEY (parent_event_id) REFERENCES events(event_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            participant_id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            bib_number INTEGER NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            gender TEXT NOT NULL,
            birthdate TEXT NOT NULL,
            club TEXT,
            classification TEXT,
            FOREIGN KEY (event_id) REFERENCES events(event_id),
            UNIQUE (bib_number, event_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_participants_bib ON participants(bib_number)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_timing_results_table(pool: &SqlitePool) -> Result<()> {
    // The UNIQUE key is what makes whole-file reprocessing safe
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS timing_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bib_number INTEGER NOT NULL,
            event_id INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            antenna_row INTEGER,
            antenna INTEGER,
            placement INTEGER,
            FOREIGN KEY (event_id) REFERENCES events(event_id),
            UNIQUE (bib_number, event_id, timestamp)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_timing_results_timestamp ON timing_results(timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_unassigned_event(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO events (event_id, event_name, parent_event_id, classification)
        VALUES (?, ?, NULL, NULL)
        "#,
    )
    .bind(UNASSIGNED_EVENT_ID)
    .bind(UNASSIGNED_EVENT_NAME)
    .execute(pool)
    .await?;

    Ok(())
}

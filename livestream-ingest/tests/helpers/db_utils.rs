//! Database and timing log test utilities

use anyhow::Result;
use livestream_common::db::{init_database, Event, Gender, NewParticipant, Participant};
use livestream_ingest::db::{self, RegistrationOutcome};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("race_timing.db")).await?;
    Ok((temp_dir, pool))
}

/// Register `bib` in `event`, panicking if it already exists
pub async fn register(pool: &SqlitePool, event: &Event, bib: i64, first_name: &str) -> Participant {
    let participant = NewParticipant {
        bib_number: bib,
        first_name: first_name.to_string(),
        last_name: "Testsson".to_string(),
        gender: Gender::Unknown,
        birthdate: "1990-01-01".to_string(),
        club: Some("IK Test".to_string()),
        classification: event.classification.clone(),
    };
    match db::insert_participant(pool, event.event_id, &participant)
        .await
        .unwrap()
    {
        RegistrationOutcome::Inserted(participant) => participant,
        RegistrationOutcome::AlreadyRegistered => panic!("bib {} already registered", bib),
    }
}

/// Write a timing log with the given lines into `dir`
pub fn write_timing_log(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("timing.txt");
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(&path, content).unwrap();
    path
}

//! Result store
//!
//! Persistence for events, participants and timing results on the shared
//! SQLite pool. The schema itself lives in `livestream_common::db`.
//!
//! Writers never take an explicit lock: duplicate deliveries are absorbed by
//! the UNIQUE constraints of the schema.

pub mod events;
pub mod participants;
pub mod results;

pub use events::{create_event, ensure_event, event_by_id, event_by_name, list_events};
pub use participants::{
    insert_participant, list_participants_by_event, participant_by_bib, RegistrationOutcome,
};
pub use results::{count_results, latest_results, upsert_result, SortOrder, UpsertOutcome};

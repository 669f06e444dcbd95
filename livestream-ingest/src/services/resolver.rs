//! Participant resolver
//!
//! Maps a punch's bib number to the registered participant (and so to its
//! event). Exact point lookup only; an unknown bib is not an error.

use crate::db;
use livestream_common::db::Participant;
use livestream_common::Result;
use sqlx::SqlitePool;

/// Outcome of a bib lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Participant),
    NotFound,
}

impl Resolution {
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            Resolution::Found(participant) => Some(participant),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

#[derive(Clone)]
pub struct ParticipantResolver {
    db: SqlitePool,
}

impl ParticipantResolver {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, bib_number: i64) -> Result<Resolution> {
        Ok(match db::participant_by_bib(&self.db, bib_number).await? {
            Some(participant) => Resolution::Found(participant),
            None => Resolution::NotFound,
        })
    }
}

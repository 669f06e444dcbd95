//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Reserved event that owns punches whose bib has no registered participant
pub const UNASSIGNED_EVENT_ID: i64 = 0;

/// Name of the reserved unassigned event
pub const UNASSIGNED_EVENT_NAME: &str = "(unassigned)";

/// A named competition unit (primary event or classification sub-event)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: i64,
    pub event_name: String,
    pub parent_event_id: Option<i64>,
    pub classification: Option<String>,
}

/// Two-value gender code; anything unrecognized stays unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "")]
    Unknown,
}

impl Gender {
    /// Normalize a roster gender token
    ///
    /// Only the fixed token set below is recognized.
    pub fn normalize(token: &str) -> Self {
        match token {
            "K" | "F" | "W" | "Kvinna" | "Woman" => Gender::Female,
            "M" | "Man" | "Male" => Gender::Male,
            _ => Gender::Unknown,
        }
    }

    /// Stored code: "F", "M" or ""
    pub fn as_code(&self) -> &'static str {
        match self {
            Gender::Female => "F",
            Gender::Male => "M",
            Gender::Unknown => "",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "F" => Gender::Female,
            "M" => Gender::Male,
            _ => Gender::Unknown,
        }
    }
}

/// A registered competitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: i64,
    pub event_id: i64,
    pub bib_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birthdate: String,
    pub club: Option<String>,
    pub classification: Option<String>,
}

/// Participant fields supplied at registration time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub bib_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birthdate: String,
    pub club: Option<String>,
    pub classification: Option<String>,
}

/// One stored hardware punch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingResult {
    pub id: i64,
    pub bib_number: i64,
    pub event_id: i64,
    pub timestamp: NaiveDateTime,
    pub antenna_row: Option<i64>,
    pub antenna: Option<i64>,
    /// Always None on insert; ranking happens elsewhere
    pub placement: Option<i64>,
}

/// A timing result joined with the participant display fields
///
/// Display fields are None for punches that did not resolve to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub bib_number: i64,
    pub event_id: i64,
    pub timestamp: NaiveDateTime,
    pub antenna_row: Option<i64>,
    pub antenna: Option<i64>,
    pub placement: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub club: Option<String>,
    pub birthdate: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_female_tokens() {
        for token in ["K", "F", "W", "Kvinna", "Woman"] {
            assert_eq!(Gender::normalize(token), Gender::Female, "token {token}");
        }
    }

    #[test]
    fn test_gender_male_tokens() {
        for token in ["M", "Man", "Male"] {
            assert_eq!(Gender::normalize(token), Gender::Male, "token {token}");
        }
    }

    #[test]
    fn test_gender_unrecognized_stays_empty() {
        for token in ["", "k", "male", "Female", "X", " M"] {
            assert_eq!(Gender::normalize(token), Gender::Unknown, "token {token:?}");
        }
        assert_eq!(Gender::Unknown.as_code(), "");
    }

    #[test]
    fn test_gender_code_round_trip() {
        for gender in [Gender::Female, Gender::Male, Gender::Unknown] {
            assert_eq!(Gender::from_code(gender.as_code()), gender);
        }
    }
}

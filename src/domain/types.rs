//! Shared types for the attendance kiosk

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Card identifier read from the stripe (the digits between `;` and `=`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable identifier of the person a card is enrolled to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One enrolled card/person pairing as held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub card_id: CardId,
    pub person_id: PersonId,
    /// Absent until the first successful check-in (or for legacy rows)
    pub last_check_in: Option<NaiveDateTime>,
    pub visit_count: u32,
}

impl CardRecord {
    pub fn new(card_id: CardId, person_id: PersonId, visit_count: u32) -> Self {
        Self { card_id, person_id, last_check_in: None, visit_count }
    }

    pub fn with_last_check_in(mut self, at: NaiveDateTime) -> Self {
        self.last_check_in = Some(at);
        self
    }
}

/// A row of the visit standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitTotal {
    pub person_id: PersonId,
    pub visits: u32,
}

//! Check-in outcomes as delivered to the foreground

use super::types::{CardId, PersonId};

/// Result classification of one check-in or enrollment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInStatus {
    Success,
    NotEnrolled,
    TooSoon,
    ClockSkewFuture,
    StoreError,
    UnknownError,
}

impl CheckInStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInStatus::Success => "success",
            CheckInStatus::NotEnrolled => "not_enrolled",
            CheckInStatus::TooSoon => "too_soon",
            CheckInStatus::ClockSkewFuture => "clock_skew_future",
            CheckInStatus::StoreError => "store_error",
            CheckInStatus::UnknownError => "unknown_error",
        }
    }

    /// Whether the kiosk holds the result on screen before accepting the next swipe
    pub fn holds_cool_down(&self) -> bool {
        !matches!(self, CheckInStatus::StoreError | CheckInStatus::NotEnrolled)
    }
}

/// Outcome produced by a background task, before it is tagged for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInOutcome {
    pub status: CheckInStatus,
    pub person_id: Option<PersonId>,
    pub error_detail: Option<String>,
}

impl CheckInOutcome {
    pub fn success(person_id: PersonId) -> Self {
        Self { status: CheckInStatus::Success, person_id: Some(person_id), error_detail: None }
    }

    pub fn status(status: CheckInStatus) -> Self {
        Self { status, person_id: None, error_detail: None }
    }

    pub fn store_error(detail: impl Into<String>) -> Self {
        Self {
            status: CheckInStatus::StoreError,
            person_id: None,
            error_detail: Some(detail.into()),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            status: CheckInStatus::UnknownError,
            person_id: None,
            error_detail: Some(detail.into()),
        }
    }
}

/// What the foreground receives for exactly one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInReport {
    pub status: CheckInStatus,
    pub person_id: Option<PersonId>,
    pub card_id: CardId,
    pub error_detail: Option<String>,
    pub visit_increment: u32,
}

impl CheckInReport {
    pub fn new(outcome: CheckInOutcome, card_id: CardId, visit_increment: u32) -> Self {
        Self {
            status: outcome.status,
            person_id: outcome.person_id,
            card_id,
            error_detail: outcome.error_detail,
            visit_increment,
        }
    }

    /// Operator-facing text for this report
    pub fn message(&self) -> String {
        match self.status {
            CheckInStatus::Success => {
                let person = self.person_id.as_ref().map(PersonId::as_str).unwrap_or("?");
                format!("{} +{} visits", person, self.visit_increment)
            }
            CheckInStatus::NotEnrolled => {
                "This card was not found in the database. Add it now?".to_string()
            }
            CheckInStatus::TooSoon => "You may only check-in once per hour.".to_string(),
            CheckInStatus::ClockSkewFuture => {
                "Previous check-in time was in the future. Check your local system time."
                    .to_string()
            }
            CheckInStatus::StoreError => format!(
                "Database error: {}",
                self.error_detail.as_deref().unwrap_or("no detail provided")
            ),
            CheckInStatus::UnknownError => "An unknown error occurred.".to_string(),
        }
    }
}

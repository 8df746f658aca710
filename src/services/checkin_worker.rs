//! Background store work for the coordinator
//!
//! These run on spawned tasks, never on the foreground loop. Each returns a
//! finished `CheckInOutcome`; store failures are classified here and nowhere
//! else.
//!
//! Every store call runs under the session timeout except the final commit of
//! a check-in. Once the commit is sent its own result is the only reliable
//! answer to whether the visit was recorded.

use crate::domain::{CardId, CardRecord, CheckInOutcome, CheckInStatus, PersonId, VisitTotal};
use crate::services::eligibility::{evaluate, Eligibility};
use crate::services::session::Session;
use crate::store::{CheckInTransaction, StoreError, StoreGateway};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Map a non-eligible decision to its outcome status
fn rejection(eligibility: Eligibility) -> Option<CheckInStatus> {
    match eligibility {
        Eligibility::Eligible => None,
        Eligibility::TooSoon => Some(CheckInStatus::TooSoon),
        Eligibility::FutureSkew => Some(CheckInStatus::ClockSkewFuture),
    }
}

/// Look up, validate and record one check-in
pub async fn run_check_in(session: Arc<Session>, card_id: CardId, increment: u32) -> CheckInOutcome {
    let start = Instant::now();
    let outcome = match check_in(&session, &card_id, increment).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(card_id = %card_id, error = %e, "check_in_store_error");
            CheckInOutcome::store_error(e.to_string())
        }
    };

    info!(
        card_id = %card_id,
        status = %outcome.status.as_str(),
        latency_ms = %start.elapsed().as_millis(),
        "check_in_completed"
    );
    outcome
}

async fn check_in(
    session: &Session,
    card_id: &CardId,
    increment: u32,
) -> Result<CheckInOutcome, StoreError> {
    let allow_within_hour = session.config().allow_check_in_within_hour();
    let store = session.store();

    let Some(record) = session.bounded(store.find_by_card_id(card_id)).await? else {
        return Ok(CheckInOutcome::status(CheckInStatus::NotEnrolled));
    };

    let now = session.clock().now();
    if let Some(status) = rejection(evaluate(now, record.last_check_in, allow_within_hour)) {
        return Ok(CheckInOutcome::status(status));
    }

    // A dropped transaction (error or timeout) rolls back and leaves the
    // record untouched
    let staged = stage_check_in(store, card_id, now, allow_within_hour, increment);
    let (txn, current, visits) = match session.bounded(staged).await? {
        Staged::Rejected(status) => return Ok(CheckInOutcome::status(status)),
        Staged::Ready { txn, current, visits } => (txn, current, visits),
    };

    txn.commit().await?;
    info!(
        card_id = %card_id,
        person_id = %current.person_id,
        visits = %visits,
        "check_in_recorded"
    );
    Ok(CheckInOutcome::success(current.person_id))
}

/// Check-in transaction with its write staged, or the reason there is none
enum Staged {
    Rejected(CheckInStatus),
    Ready { txn: Box<dyn CheckInTransaction>, current: CardRecord, visits: u32 },
}

/// Re-read the record under lock, re-check it and stage the write
async fn stage_check_in(
    store: &dyn StoreGateway,
    card_id: &CardId,
    now: NaiveDateTime,
    allow_within_hour: bool,
    increment: u32,
) -> Result<Staged, StoreError> {
    let mut txn = store.begin_check_in(card_id).await?;
    let Some(current) = txn.record().cloned() else {
        return Ok(Staged::Rejected(CheckInStatus::NotEnrolled));
    };

    if let Some(status) = rejection(evaluate(now, current.last_check_in, allow_within_hour)) {
        return Ok(Staged::Rejected(status));
    }

    let visits = current.visit_count.saturating_add(increment);
    txn.update_check_in(now, visits).await?;
    Ok(Staged::Ready { txn, current, visits })
}

/// Enroll a new card and report it like a successful check-in
pub async fn run_enrollment(
    session: Arc<Session>,
    card_id: CardId,
    person_id: PersonId,
    initial_visits: u32,
) -> CheckInOutcome {
    let insert = session.store().insert(&card_id, &person_id, initial_visits);
    match session.bounded(insert).await {
        Ok(()) => {
            info!(
                card_id = %card_id,
                person_id = %person_id,
                visits = %initial_visits,
                "card_enrolled"
            );
            CheckInOutcome::success(person_id)
        }
        Err(e) => {
            warn!(card_id = %card_id, error = %e, "enrollment_store_error");
            CheckInOutcome::store_error(e.to_string())
        }
    }
}

/// Result of a standings query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitQueryResult {
    Rows(Vec<VisitTotal>),
    /// A person filter matched nothing
    NoResults,
    StoreError(String),
}

/// Fetch visit standings, optionally for one person
pub async fn run_visit_query(session: Arc<Session>, person_id: Option<PersonId>) -> VisitQueryResult {
    let query = session.store().list_visits(person_id.as_ref());
    match session.bounded(query).await {
        Ok(rows) if rows.is_empty() && person_id.is_some() => VisitQueryResult::NoResults,
        Ok(rows) => VisitQueryResult::Rows(rows),
        Err(e) => {
            warn!(error = %e, "visit_query_store_error");
            VisitQueryResult::StoreError(e.to_string())
        }
    }
}

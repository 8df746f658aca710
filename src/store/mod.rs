//! Store gateway - persistence port for card records
//!
//! The kiosk only talks to the store through [`StoreGateway`]. Two backends:
//! - `memory` - process-local table for demo mode and tests
//! - `postgres` - shared database via sqlx, parameterized statements only
//!
//! The check-in mutation is a scoped [`CheckInTransaction`]. The record is
//! re-read under a lock when the transaction opens. `update_check_in` stages
//! the write and only `commit` makes it visible; dropping the transaction
//! before that rolls it back.

pub mod memory;
pub mod postgres;

use crate::domain::{CardId, CardRecord, PersonId, VisitTotal};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(String),
    #[error("store call timed out after {0} ms")]
    Timeout(u64),
    #[error("card {0} is already enrolled")]
    Duplicate(CardId),
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::Database(ref db) => StoreError::Database(db.message().to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Open check-in transaction holding a lock on one card record
#[async_trait]
pub trait CheckInTransaction: Send {
    /// Record as re-read inside the transaction (`None` if it vanished)
    fn record(&self) -> Option<&CardRecord>;

    /// Write the new check-in time and visit count; not visible until `commit`
    async fn update_check_in(
        &mut self,
        at: NaiveDateTime,
        visit_count: u32,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn find_by_card_id(&self, card_id: &CardId) -> Result<Option<CardRecord>, StoreError>;

    async fn insert(
        &self,
        card_id: &CardId,
        person_id: &PersonId,
        initial_visits: u32,
    ) -> Result<(), StoreError>;

    async fn begin_check_in(
        &self,
        card_id: &CardId,
    ) -> Result<Box<dyn CheckInTransaction>, StoreError>;

    /// Visit totals; all persons ordered by visits descending when unfiltered
    async fn list_visits(&self, person_id: Option<&PersonId>)
        -> Result<Vec<VisitTotal>, StoreError>;

    async fn close(&self) {}
}

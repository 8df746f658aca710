use super::{CheckInTransaction, StoreError, StoreGateway};
use crate::domain::{CardId, CardRecord, PersonId, VisitTotal};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A thread-safe in-memory card table.
///
/// A check-in transaction holds the table lock from the re-read until commit,
/// so no other mutation can land between read and write. Failure switches let
/// tests exercise the store-error paths.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<CardId, CardRecord>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given records
    pub fn with_records(records: impl IntoIterator<Item = CardRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.card_id.clone(), r)).collect();
        Self { records: Arc::new(Mutex::new(map)), ..Self::default() }
    }

    /// Sample roster used by `--demo`
    pub fn demo() -> Self {
        Self::with_records([
            CardRecord::new(CardId::new("123456"), PersonId::new("alice"), 12),
            CardRecord::new(CardId::new("234567"), PersonId::new("bob"), 7),
            CardRecord::new(CardId::new("345678"), PersonId::new("carol"), 3),
        ])
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Direct read without a transaction, for assertions
    pub async fn snapshot(&self, card_id: &CardId) -> Option<CardRecord> {
        self.records.lock().await.get(card_id).cloned()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("read failed (injected)".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("write failed (injected)".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    async fn find_by_card_id(&self, card_id: &CardId) -> Result<Option<CardRecord>, StoreError> {
        self.check_reads()?;
        Ok(self.records.lock().await.get(card_id).cloned())
    }

    async fn insert(
        &self,
        card_id: &CardId,
        person_id: &PersonId,
        initial_visits: u32,
    ) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut records = self.records.lock().await;
        if records.contains_key(card_id) {
            return Err(StoreError::Duplicate(card_id.clone()));
        }
        records.insert(
            card_id.clone(),
            CardRecord::new(card_id.clone(), person_id.clone(), initial_visits),
        );
        Ok(())
    }

    async fn begin_check_in(
        &self,
        card_id: &CardId,
    ) -> Result<Box<dyn CheckInTransaction>, StoreError> {
        self.check_reads()?;
        let table = self.records.clone().lock_owned().await;
        let record = table.get(card_id).cloned();
        Ok(Box::new(MemoryCheckIn {
            table,
            record,
            staged: None,
            fail_writes: self.fail_writes.clone(),
        }))
    }

    async fn list_visits(
        &self,
        person_id: Option<&PersonId>,
    ) -> Result<Vec<VisitTotal>, StoreError> {
        self.check_reads()?;
        let records = self.records.lock().await;
        let mut totals: Vec<VisitTotal> = records
            .values()
            .filter(|r| person_id.map_or(true, |p| &r.person_id == p))
            .map(|r| VisitTotal { person_id: r.person_id.clone(), visits: r.visit_count })
            .collect();
        totals.sort_by(|a, b| b.visits.cmp(&a.visits).then_with(|| a.person_id.0.cmp(&b.person_id.0)));
        Ok(totals)
    }
}

struct MemoryCheckIn {
    table: OwnedMutexGuard<HashMap<CardId, CardRecord>>,
    record: Option<CardRecord>,
    staged: Option<(NaiveDateTime, u32)>,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl CheckInTransaction for MemoryCheckIn {
    fn record(&self) -> Option<&CardRecord> {
        self.record.as_ref()
    }

    async fn update_check_in(
        &mut self,
        at: NaiveDateTime,
        visit_count: u32,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("write failed (injected)".to_string()));
        }
        if self.record.is_none() {
            return Err(StoreError::Database("no record to update".to_string()));
        }
        self.staged = Some((at, visit_count));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let (Some(card_id), Some((at, visit_count))) =
            (self.record.as_ref().map(|r| r.card_id.clone()), self.staged)
        else {
            return Ok(());
        };
        let Some(entry) = self.table.get_mut(&card_id) else {
            return Err(StoreError::Database(format!("card {} vanished", card_id)));
        };
        entry.last_check_in = Some(at);
        entry.visit_count = visit_count;
        Ok(())
    }
}

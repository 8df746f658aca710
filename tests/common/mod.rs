//! Shared harness for kiosk integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use attendance_kiosk::domain::{CardId, CardRecord, PersonId, VisitTotal};
use attendance_kiosk::infra::{Config, FixedClock};
use attendance_kiosk::services::{Coordinator, CoordinatorEvent, Session};
use attendance_kiosk::store::{CheckInTransaction, InMemoryStore, StoreError, StoreGateway};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn at(date: (i32, u32, u32), hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Config with a short cool-down so tests see `Reset` quickly
pub fn test_config() -> Config {
    Config::default().with_cool_down_ms(50).with_store_timeout_ms(1000)
}

pub fn session(
    config: Config,
    store: Arc<dyn StoreGateway>,
    now: NaiveDateTime,
) -> (Arc<Session>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let session = Session::with_clock(config, store, clock.clone());
    (Arc::new(session), clock)
}

pub fn record(card: &str, person: &str, visits: u32, last: Option<NaiveDateTime>) -> CardRecord {
    let record = CardRecord::new(CardId::new(card), PersonId::new(person), visits);
    match last {
        Some(at) => record.with_last_check_in(at),
        None => record,
    }
}

/// Wait for the next coordinator event, failing the test after two seconds
pub async fn next_event(coordinator: &mut Coordinator) -> CoordinatorEvent {
    tokio::time::timeout(Duration::from_secs(2), coordinator.next_event())
        .await
        .expect("coordinator event within timeout")
}

/// Assert nothing arrives within `wait`
pub async fn assert_quiet(coordinator: &mut Coordinator, wait: Duration) {
    let got = tokio::time::timeout(wait, coordinator.next_event()).await;
    assert!(got.is_err(), "unexpected event: {:?}", got);
}

/// Store whose lookups block until the test releases them
#[derive(Clone)]
pub struct GatedStore {
    inner: InMemoryStore,
    gate: Arc<Semaphore>,
}

impl GatedStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner, gate: Arc::new(Semaphore::new(0)) }
    }

    /// Let one pending (or future) lookup through
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl StoreGateway for GatedStore {
    async fn find_by_card_id(&self, card_id: &CardId) -> Result<Option<CardRecord>, StoreError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        permit.forget();
        self.inner.find_by_card_id(card_id).await
    }

    async fn insert(
        &self,
        card_id: &CardId,
        person_id: &PersonId,
        initial_visits: u32,
    ) -> Result<(), StoreError> {
        self.inner.insert(card_id, person_id, initial_visits).await
    }

    async fn begin_check_in(
        &self,
        card_id: &CardId,
    ) -> Result<Box<dyn CheckInTransaction>, StoreError> {
        self.inner.begin_check_in(card_id).await
    }

    async fn list_visits(&self, person_id: Option<&PersonId>) -> Result<Vec<VisitTotal>, StoreError> {
        self.inner.list_visits(person_id).await
    }
}

/// Store that panics on every lookup
pub struct PanickingStore;

#[async_trait]
impl StoreGateway for PanickingStore {
    async fn find_by_card_id(&self, _card_id: &CardId) -> Result<Option<CardRecord>, StoreError> {
        panic!("driver crashed");
    }

    async fn insert(&self, _: &CardId, _: &PersonId, _: u32) -> Result<(), StoreError> {
        panic!("driver crashed");
    }

    async fn begin_check_in(&self, _: &CardId) -> Result<Box<dyn CheckInTransaction>, StoreError> {
        panic!("driver crashed");
    }

    async fn list_visits(&self, _: Option<&PersonId>) -> Result<Vec<VisitTotal>, StoreError> {
        panic!("driver crashed");
    }
}

/// Store whose check-in commits stall for `delay` before landing
#[derive(Clone)]
pub struct SlowCommitStore {
    inner: InMemoryStore,
    delay: Duration,
}

impl SlowCommitStore {
    pub fn new(inner: InMemoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

struct SlowCommit {
    inner: Box<dyn CheckInTransaction>,
    delay: Duration,
}

#[async_trait]
impl CheckInTransaction for SlowCommit {
    fn record(&self) -> Option<&CardRecord> {
        self.inner.record()
    }

    async fn update_check_in(&mut self, at: NaiveDateTime, visit_count: u32) -> Result<(), StoreError> {
        self.inner.update_check_in(at, visit_count).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.commit().await
    }
}

#[async_trait]
impl StoreGateway for SlowCommitStore {
    async fn find_by_card_id(&self, card_id: &CardId) -> Result<Option<CardRecord>, StoreError> {
        self.inner.find_by_card_id(card_id).await
    }

    async fn insert(
        &self,
        card_id: &CardId,
        person_id: &PersonId,
        initial_visits: u32,
    ) -> Result<(), StoreError> {
        self.inner.insert(card_id, person_id, initial_visits).await
    }

    async fn begin_check_in(
        &self,
        card_id: &CardId,
    ) -> Result<Box<dyn CheckInTransaction>, StoreError> {
        let inner = self.inner.begin_check_in(card_id).await?;
        Ok(Box::new(SlowCommit { inner, delay: self.delay }))
    }

    async fn list_visits(&self, person_id: Option<&PersonId>) -> Result<Vec<VisitTotal>, StoreError> {
        self.inner.list_visits(person_id).await
    }
}

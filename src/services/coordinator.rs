//! Check-in coordinator - one outstanding operation, cancellable
//!
//! State machine:
//! - `Idle` → swipe or enrollment dispatches a background task → `AwaitingResult`
//! - `AwaitingResult` → task finishes → report delivered → `CoolingDown`
//!   (store errors and unknown cards go straight back to `Idle`)
//! - `CoolingDown` → timer fires → `Reset` delivered → `Idle`
//!
//! Background tasks post back over an mpsc channel tagged with the op id they
//! were dispatched for. The coordinator only accepts messages for its active
//! op, so a result or timer that lands after `cancel()` is dropped unseen.
//! Nothing here blocks; callers drain events with `poll()` or await
//! `next_event()` from their own loop.

use crate::domain::{CardId, CheckInOutcome, CheckInReport, PersonId};
use crate::services::checkin_worker::{run_check_in, run_enrollment};
use crate::services::session::Session;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Channel depth for task results; stale messages are drained on receipt
const MESSAGE_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    AwaitingResult,
    CoolingDown,
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::AwaitingResult => "awaiting_result",
            CoordinatorState::CoolingDown => "cooling_down",
        }
    }
}

/// Delivered to the foreground
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Exactly one per dispatched operation (unless cancelled)
    Report(CheckInReport),
    /// Cool-down elapsed; the surface should return to "waiting for swipe"
    Reset,
}

#[derive(Debug)]
enum TaskMessage {
    Finished { op_id: u64, report: CheckInReport },
    CoolDownElapsed { op_id: u64 },
}

pub struct Coordinator {
    session: Arc<Session>,
    state: CoordinatorState,
    visit_increment: u32,
    next_op_id: u64,
    active_op: Option<u64>,
    msg_tx: mpsc::Sender<TaskMessage>,
    msg_rx: mpsc::Receiver<TaskMessage>,
}

impl Coordinator {
    pub fn new(session: Arc<Session>) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(MESSAGE_BUFFER);
        let visit_increment = session.config().default_visit_increment();
        Self {
            session,
            state: CoordinatorState::Idle,
            visit_increment,
            next_op_id: 1,
            active_op: None,
            msg_tx,
            msg_rx,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn visit_increment(&self) -> u32 {
        self.visit_increment
    }

    /// Visits credited per check-in for the rest of this check-in session
    pub fn set_visit_increment(&mut self, increment: u32) {
        self.visit_increment = increment;
    }

    /// Start a check-in for a decoded card. Returns false if busy.
    pub fn submit_card(&mut self, card_id: CardId) -> bool {
        if self.state != CoordinatorState::Idle {
            debug!(card_id = %card_id, state = %self.state.as_str(), "swipe_ignored_busy");
            return false;
        }

        let increment = self.visit_increment;
        let work = run_check_in(self.session.clone(), card_id.clone(), increment);
        self.dispatch("check_in", card_id, work);
        true
    }

    /// Enroll a card after a `NotEnrolled` report. Returns false if busy.
    pub fn enroll(&mut self, card_id: CardId, person_id: PersonId) -> bool {
        if self.state != CoordinatorState::Idle {
            debug!(card_id = %card_id, state = %self.state.as_str(), "enroll_ignored_busy");
            return false;
        }

        let initial = self.visit_increment;
        let work = run_enrollment(self.session.clone(), card_id.clone(), person_id, initial);
        self.dispatch("enroll", card_id, work);
        true
    }

    /// Operator left the check-in surface: drop the active op and go idle
    pub fn cancel(&mut self) {
        if let Some(op_id) = self.active_op.take() {
            info!(op_id = %op_id, state = %self.state.as_str(), "operation_cancelled");
        }
        self.state = CoordinatorState::Idle;
    }

    /// Drain every message that has already arrived, without waiting
    pub fn poll(&mut self) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            if let Some(event) = self.handle(msg) {
                events.push(event);
            }
        }
        events
    }

    /// Wait for the next event for the active op. Cancel-safe.
    pub async fn next_event(&mut self) -> CoordinatorEvent {
        loop {
            // Never `None`: the coordinator holds a sender
            let Some(msg) = self.msg_rx.recv().await else {
                return std::future::pending().await;
            };
            if let Some(event) = self.handle(msg) {
                return event;
            }
        }
    }

    fn dispatch<F>(&mut self, kind: &'static str, card_id: CardId, work: F)
    where
        F: Future<Output = CheckInOutcome> + Send + 'static,
    {
        let op_id = self.next_op_id;
        self.next_op_id += 1;
        self.active_op = Some(op_id);
        self.state = CoordinatorState::AwaitingResult;

        info!(op_id = %op_id, card_id = %card_id, kind = %kind, "operation_dispatched");

        let increment = self.visit_increment;
        let tx = self.msg_tx.clone();
        let task = tokio::spawn(work);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(op_id = %op_id, kind = %kind, error = %e, "operation_task_failed");
                    CheckInOutcome::unknown(e.to_string())
                }
            };
            let report = CheckInReport::new(outcome, card_id, increment);
            // Receiver gone means the kiosk is shutting down
            let _ = tx.send(TaskMessage::Finished { op_id, report }).await;
        });
    }

    fn start_cool_down(&mut self, op_id: u64) {
        self.state = CoordinatorState::CoolingDown;
        let hold = Duration::from_millis(self.session.config().cool_down_ms());
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            let _ = tx.send(TaskMessage::CoolDownElapsed { op_id }).await;
        });
    }

    fn handle(&mut self, msg: TaskMessage) -> Option<CoordinatorEvent> {
        match msg {
            TaskMessage::Finished { op_id, report }
                if self.active_op == Some(op_id)
                    && self.state == CoordinatorState::AwaitingResult =>
            {
                info!(
                    op_id = %op_id,
                    card_id = %report.card_id,
                    status = %report.status.as_str(),
                    "operation_result_delivered"
                );
                if report.status.holds_cool_down() {
                    self.start_cool_down(op_id);
                } else {
                    self.active_op = None;
                    self.state = CoordinatorState::Idle;
                }
                Some(CoordinatorEvent::Report(report))
            }
            TaskMessage::CoolDownElapsed { op_id }
                if self.active_op == Some(op_id) && self.state == CoordinatorState::CoolingDown =>
            {
                debug!(op_id = %op_id, "cool_down_elapsed");
                self.active_op = None;
                self.state = CoordinatorState::Idle;
                Some(CoordinatorEvent::Reset)
            }
            TaskMessage::Finished { op_id, report } => {
                debug!(op_id = %op_id, card_id = %report.card_id, "stale_result_discarded");
                None
            }
            TaskMessage::CoolDownElapsed { op_id } => {
                debug!(op_id = %op_id, "stale_cool_down_discarded");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CardRecord, CheckInStatus};
    use crate::infra::clock::FixedClock;
    use crate::infra::config::Config;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;
    use tokio::time::timeout;

    fn coordinator_with(store: InMemoryStore, config: Config) -> Coordinator {
        let now = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let session = Session::with_clock(config, Arc::new(store), Arc::new(FixedClock::new(now)));
        Coordinator::new(Arc::new(session))
    }

    async fn next(coordinator: &mut Coordinator) -> CoordinatorEvent {
        timeout(Duration::from_secs(2), coordinator.next_event()).await.expect("event expected")
    }

    #[tokio::test]
    async fn test_success_then_cool_down_then_reset() {
        let store = InMemoryStore::with_records([CardRecord::new(
            CardId::new("42"),
            PersonId::new("dana"),
            0,
        )]);
        let mut c = coordinator_with(store, Config::default().with_cool_down_ms(20));

        assert!(c.submit_card(CardId::new("42")));
        assert_eq!(c.state(), CoordinatorState::AwaitingResult);

        let CoordinatorEvent::Report(report) = next(&mut c).await else {
            panic!("expected report");
        };
        assert_eq!(report.status, CheckInStatus::Success);
        assert_eq!(c.state(), CoordinatorState::CoolingDown);

        assert_eq!(next(&mut c).await, CoordinatorEvent::Reset);
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_store_error_skips_cool_down() {
        let store = InMemoryStore::demo();
        store.set_fail_reads(true);
        let mut c = coordinator_with(store, Config::default().with_cool_down_ms(60_000));

        c.submit_card(CardId::new("123456"));
        let CoordinatorEvent::Report(report) = next(&mut c).await else {
            panic!("expected report");
        };
        assert_eq!(report.status, CheckInStatus::StoreError);
        assert_eq!(report.error_detail.as_deref(), Some("read failed (injected)"));
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_during_cool_down_drops_reset() {
        let mut c = coordinator_with(InMemoryStore::demo(), Config::default().with_cool_down_ms(30));
        c.submit_card(CardId::new("234567"));
        assert!(matches!(next(&mut c).await, CoordinatorEvent::Report(_)));
        assert_eq!(c.state(), CoordinatorState::CoolingDown);

        c.cancel();
        assert_eq!(c.state(), CoordinatorState::Idle);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(c.poll().is_empty());
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_poll_is_non_blocking_when_nothing_arrived() {
        let mut c = coordinator_with(InMemoryStore::demo(), Config::default());
        assert!(c.poll().is_empty());
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_enroll_only_when_idle() {
        let mut c = coordinator_with(InMemoryStore::demo(), Config::default().with_cool_down_ms(10));
        c.submit_card(CardId::new("123456"));
        assert!(!c.enroll(CardId::new("777"), PersonId::new("erin")));
    }
}

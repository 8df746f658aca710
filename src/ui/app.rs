//! Kiosk foreground state
//!
//! Owns the swipe decoder and the coordinator and turns input events and
//! background results into screen state. Rendering lives in `render`; this
//! module has no terminal dependency beyond key event types, so tests drive
//! it directly.

use crate::domain::{CardId, CheckInReport, CheckInStatus, PersonId, VisitTotal};
use crate::io::InputEvent;
use crate::services::checkin_worker::{run_visit_query, VisitQueryResult};
use crate::services::{Coordinator, CoordinatorEvent, Session, SwipeDecoder};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const WAITING_MESSAGE: &str = "Waiting for card swipe...";
pub const NO_RESULTS_MESSAGE: &str = "The specified user ID was not found in the database";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    /// Visit value asked for on entry to the check-in screen
    VisitValuePrompt { input: String, error: Option<String> },
    CheckIn,
    EnrollConfirm { card_id: CardId },
    EnrollName { card_id: CardId, input: String },
    VisitsFilterPrompt { input: String },
    Visits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Good,
    Bad,
}

/// Large message on the check-in screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub tone: Tone,
}

impl Banner {
    fn waiting() -> Self {
        Self { text: WAITING_MESSAGE.to_string(), tone: Tone::Neutral }
    }

    fn from_report(report: &CheckInReport) -> Self {
        let tone = if report.status == CheckInStatus::Success { Tone::Good } else { Tone::Bad };
        Self { text: report.message(), tone }
    }
}

#[derive(Debug, Default)]
pub struct VisitsView {
    pub rows: Vec<VisitTotal>,
    pub loading: bool,
    pub filter: Option<PersonId>,
}

/// Something finished in the background
#[derive(Debug)]
pub enum Background {
    Coordinator(CoordinatorEvent),
    Visits { query_id: u64, result: VisitQueryResult },
}

pub struct App {
    session: Arc<Session>,
    coordinator: Coordinator,
    decoder: SwipeDecoder,
    screen: Screen,
    banner: Banner,
    /// Modal message; the next key press dismisses it
    dialog: Option<String>,
    visits: VisitsView,
    visit_query_id: u64,
    visits_tx: mpsc::Sender<(u64, VisitQueryResult)>,
    visits_rx: mpsc::Receiver<(u64, VisitQueryResult)>,
    should_quit: bool,
}

impl App {
    pub fn new(session: Arc<Session>) -> Self {
        let (visits_tx, visits_rx) = mpsc::channel(4);
        let decoder = SwipeDecoder::new(session.config().max_buffer_len());
        Self {
            coordinator: Coordinator::new(session.clone()),
            session,
            decoder,
            screen: Screen::MainMenu,
            banner: Banner::waiting(),
            dialog: None,
            visits: VisitsView::default(),
            visit_query_id: 0,
            visits_tx,
            visits_rx,
            should_quit: false,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn dialog(&self) -> Option<&str> {
        self.dialog.as_deref()
    }

    pub fn visits(&self) -> &VisitsView {
        &self.visits
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn site_name(&self) -> &str {
        self.session.config().site_name()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Wait for the next background result. Cancel-safe.
    pub async fn next_background(&mut self) -> Background {
        tokio::select! {
            event = self.coordinator.next_event() => Background::Coordinator(event),
            Some((query_id, result)) = self.visits_rx.recv() => {
                Background::Visits { query_id, result }
            }
        }
    }

    pub fn apply_background(&mut self, background: Background) {
        match background {
            Background::Coordinator(event) => self.handle_coordinator_event(event),
            Background::Visits { query_id, result } => self.handle_visit_result(query_id, result),
        }
    }

    pub fn handle_input(&mut self, input: InputEvent) {
        match input {
            InputEvent::Key(key) => self.handle_key(key),
            InputEvent::ReaderChar(c) => {
                if self.screen == Screen::CheckIn {
                    self.feed_swipe(c);
                }
            }
            InputEvent::Resize => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.leave_check_in();
            self.should_quit = true;
            return;
        }

        // Enter and Esc only dismiss; any other key also acts on the screen,
        // so a keyboard-wedge swipe started over a notice still decodes
        if self.dialog.take().is_some() && matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            return;
        }

        match std::mem::replace(&mut self.screen, Screen::MainMenu) {
            Screen::MainMenu => self.on_main_menu_key(key.code),
            Screen::VisitValuePrompt { input, error } => {
                self.on_visit_value_key(key.code, input, error)
            }
            Screen::CheckIn => self.on_check_in_key(key.code),
            Screen::EnrollConfirm { card_id } => self.on_enroll_confirm_key(key.code, card_id),
            Screen::EnrollName { card_id, input } => {
                self.on_enroll_name_key(key.code, card_id, input)
            }
            Screen::VisitsFilterPrompt { input } => self.on_visits_filter_key(key.code, input),
            Screen::Visits => self.on_visits_key(key.code),
        }
    }

    fn on_main_menu_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('1') | KeyCode::Char('c') => {
                let input = self.session.config().default_visit_increment().to_string();
                self.screen = Screen::VisitValuePrompt { input, error: None };
            }
            KeyCode::Char('2') | KeyCode::Char('v') => {
                self.screen = Screen::VisitsFilterPrompt { input: String::new() };
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    fn on_visit_value_key(&mut self, code: KeyCode, mut input: String, error: Option<String>) {
        match code {
            KeyCode::Esc => return,
            KeyCode::Enter => match parse_visit_value(&input) {
                Some(increment) => {
                    self.coordinator.set_visit_increment(increment);
                    self.decoder.reset();
                    self.banner = Banner::waiting();
                    info!(visit_increment = %increment, "check_in_screen_opened");
                    self.screen = Screen::CheckIn;
                    return;
                }
                None => {
                    self.screen =
                        Screen::VisitValuePrompt { input, error: Some("Invalid input".into()) };
                    return;
                }
            },
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
        self.screen = Screen::VisitValuePrompt { input, error };
    }

    fn on_check_in_key(&mut self, code: KeyCode) {
        self.screen = Screen::CheckIn;
        match code {
            KeyCode::Esc => self.leave_check_in(),
            KeyCode::Char(c) => self.feed_swipe(c),
            _ => {}
        }
    }

    fn on_enroll_confirm_key(&mut self, code: KeyCode, card_id: CardId) {
        self.screen = match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                Screen::EnrollName { card_id, input: String::new() }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Screen::CheckIn,
            _ => Screen::EnrollConfirm { card_id },
        };
    }

    fn on_enroll_name_key(&mut self, code: KeyCode, card_id: CardId, mut input: String) {
        match code {
            KeyCode::Esc => self.screen = Screen::CheckIn,
            KeyCode::Enter => {
                let person = input.trim();
                if !person.is_empty() && self.coordinator.enroll(card_id, PersonId::new(person)) {
                    self.banner = Banner { text: "Adding card...".into(), tone: Tone::Neutral };
                }
                self.screen = Screen::CheckIn;
            }
            KeyCode::Backspace => {
                input.pop();
                self.screen = Screen::EnrollName { card_id, input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.screen = Screen::EnrollName { card_id, input };
            }
            _ => self.screen = Screen::EnrollName { card_id, input },
        }
    }

    fn on_visits_filter_key(&mut self, code: KeyCode, mut input: String) {
        match code {
            KeyCode::Esc => {}
            KeyCode::Enter => {
                let filter = Some(input.trim()).filter(|s| !s.is_empty()).map(PersonId::new);
                self.start_visit_query(filter);
                self.screen = Screen::Visits;
            }
            KeyCode::Backspace => {
                input.pop();
                self.screen = Screen::VisitsFilterPrompt { input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.screen = Screen::VisitsFilterPrompt { input };
            }
            _ => self.screen = Screen::VisitsFilterPrompt { input },
        }
    }

    fn on_visits_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('b') => {
                // Any result still in flight belongs to the abandoned query
                self.visit_query_id += 1;
                self.visits = VisitsView::default();
            }
            _ => self.screen = Screen::Visits,
        }
    }

    fn feed_swipe(&mut self, c: char) {
        let Some(card_id) = self.decoder.feed(c) else {
            return;
        };
        if self.coordinator.submit_card(card_id) {
            self.banner = Banner { text: "Checking in...".into(), tone: Tone::Neutral };
        }
    }

    fn leave_check_in(&mut self) {
        self.coordinator.cancel();
        self.decoder.reset();
        self.banner = Banner::waiting();
    }

    fn start_visit_query(&mut self, filter: Option<PersonId>) {
        self.visit_query_id += 1;
        let query_id = self.visit_query_id;
        self.visits = VisitsView { rows: Vec::new(), loading: true, filter: filter.clone() };

        let session = self.session.clone();
        let tx = self.visits_tx.clone();
        tokio::spawn(async move {
            let result = run_visit_query(session, filter).await;
            let _ = tx.send((query_id, result)).await;
        });
    }

    fn handle_coordinator_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Reset => self.banner = Banner::waiting(),
            CoordinatorEvent::Report(report) => match report.status {
                CheckInStatus::NotEnrolled => {
                    self.banner = Banner::waiting();
                    if self.screen == Screen::CheckIn {
                        self.screen = Screen::EnrollConfirm { card_id: report.card_id };
                    }
                }
                CheckInStatus::StoreError => {
                    self.banner = Banner::waiting();
                    self.dialog = Some(format!("WARNING! {}", report.message()));
                }
                CheckInStatus::UnknownError => {
                    self.banner = Banner::from_report(&report);
                    self.dialog = Some(report.message());
                }
                _ => self.banner = Banner::from_report(&report),
            },
        }
    }

    fn handle_visit_result(&mut self, query_id: u64, result: VisitQueryResult) {
        if query_id != self.visit_query_id {
            debug!(query_id = %query_id, "stale_visit_result_discarded");
            return;
        }

        self.visits.loading = false;
        match result {
            VisitQueryResult::Rows(rows) => self.visits.rows = rows,
            VisitQueryResult::NoResults => self.dialog = Some(NO_RESULTS_MESSAGE.to_string()),
            VisitQueryResult::StoreError(detail) => {
                self.dialog = Some(format!("WARNING! Database error: {}", detail))
            }
        }
    }
}

/// Visit values must be all digits
fn parse_visit_value(input: &str) -> Option<u32> {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CardRecord;
    use crate::infra::clock::FixedClock;
    use crate::infra::config::Config;
    use crate::services::CoordinatorState;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tokio::time::timeout;

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.handle_input(key(KeyCode::Char(c)));
        }
    }

    fn test_app(store: InMemoryStore) -> App {
        let now = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let config = Config::default().with_cool_down_ms(10_000);
        let session = Session::with_clock(config, Arc::new(store), Arc::new(FixedClock::new(now)));
        App::new(Arc::new(session))
    }

    async fn settle(app: &mut App) {
        let bg = timeout(Duration::from_secs(2), app.next_background()).await.unwrap();
        app.apply_background(bg);
    }

    fn open_check_in(app: &mut App, visit_value: &str) {
        app.handle_input(key(KeyCode::Char('1')));
        for _ in 0..4 {
            app.handle_input(key(KeyCode::Backspace));
        }
        type_str(app, visit_value);
        app.handle_input(key(KeyCode::Enter));
    }

    #[test]
    fn test_parse_visit_value() {
        assert_eq!(parse_visit_value("3"), Some(3));
        assert_eq!(parse_visit_value("010"), Some(10));
        assert_eq!(parse_visit_value(""), None);
        assert_eq!(parse_visit_value("-1"), None);
        assert_eq!(parse_visit_value("1.5"), None);
        assert_eq!(parse_visit_value("99999999999"), None);
    }

    #[tokio::test]
    async fn test_invalid_visit_value_reprompts() {
        let mut app = test_app(InMemoryStore::demo());
        open_check_in(&mut app, "x");
        assert!(matches!(
            app.screen(),
            Screen::VisitValuePrompt { error: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_keyboard_swipe_checks_in() {
        let mut app = test_app(InMemoryStore::demo());
        open_check_in(&mut app, "2");
        assert_eq!(app.screen(), &Screen::CheckIn);

        type_str(&mut app, ";345678=0001?");
        assert_eq!(app.coordinator().state(), CoordinatorState::AwaitingResult);

        settle(&mut app).await;
        assert_eq!(app.banner().text, "carol +2 visits");
        assert_eq!(app.banner().tone, Tone::Good);
    }

    #[tokio::test]
    async fn test_unknown_card_enrollment_flow() {
        let store = InMemoryStore::new();
        let mut app = test_app(store.clone());
        open_check_in(&mut app, "1");

        type_str(&mut app, ";999999=1?");
        settle(&mut app).await;
        assert_eq!(app.screen(), &Screen::EnrollConfirm { card_id: CardId::new("999999") });

        app.handle_input(key(KeyCode::Char('y')));
        type_str(&mut app, "alice");
        app.handle_input(key(KeyCode::Enter));
        assert_eq!(app.screen(), &Screen::CheckIn);

        settle(&mut app).await;
        assert_eq!(app.banner().text, "alice +1 visits");
        let record = store.snapshot(&CardId::new("999999")).await.unwrap();
        assert_eq!(record.visit_count, 1);
    }

    #[tokio::test]
    async fn test_empty_enrollment_name_aborts() {
        let store = InMemoryStore::new();
        let mut app = test_app(store.clone());
        open_check_in(&mut app, "1");
        type_str(&mut app, ";5=1?");
        settle(&mut app).await;

        app.handle_input(key(KeyCode::Char('y')));
        app.handle_input(key(KeyCode::Enter));
        assert_eq!(app.screen(), &Screen::CheckIn);
        assert_eq!(app.coordinator().state(), CoordinatorState::Idle);
        assert!(store.snapshot(&CardId::new("5")).await.is_none());
    }

    #[tokio::test]
    async fn test_store_error_shows_dialog() {
        let store = InMemoryStore::demo();
        store.set_fail_reads(true);
        let mut app = test_app(store);
        open_check_in(&mut app, "1");
        type_str(&mut app, ";123456=1?");
        settle(&mut app).await;

        assert_eq!(app.dialog(), Some("WARNING! Database error: read failed (injected)"));
        assert_eq!(app.banner().text, WAITING_MESSAGE);

        app.handle_input(key(KeyCode::Enter));
        assert_eq!(app.dialog(), None);
        assert_eq!(app.screen(), &Screen::CheckIn);
    }

    #[tokio::test]
    async fn test_swipe_over_error_notice_still_decodes() {
        let store = InMemoryStore::demo();
        store.set_fail_reads(true);
        let mut app = test_app(store.clone());
        open_check_in(&mut app, "1");
        type_str(&mut app, ";123456=1?");
        settle(&mut app).await;
        assert!(app.dialog().is_some());

        // Re-swipe while the notice is still up; its ';' dismisses it
        store.set_fail_reads(false);
        type_str(&mut app, ";123456=1?");
        assert_eq!(app.dialog(), None);
        assert_eq!(app.coordinator().state(), CoordinatorState::AwaitingResult);

        settle(&mut app).await;
        assert_eq!(app.banner().text, "alice +1 visits");
    }

    #[tokio::test]
    async fn test_back_cancels_coordinator() {
        let mut app = test_app(InMemoryStore::demo());
        open_check_in(&mut app, "1");
        type_str(&mut app, ";123456=1?");
        app.handle_input(key(KeyCode::Esc));

        assert_eq!(app.screen(), &Screen::MainMenu);
        assert_eq!(app.coordinator().state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_reader_chars_ignored_outside_check_in() {
        let mut app = test_app(InMemoryStore::demo());
        for c in ";123456=1?".chars() {
            app.handle_input(InputEvent::ReaderChar(c));
        }
        assert_eq!(app.coordinator().state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_visit_standings() {
        let store = InMemoryStore::with_records([
            CardRecord::new(CardId::new("1"), PersonId::new("low"), 1),
            CardRecord::new(CardId::new("2"), PersonId::new("high"), 9),
        ]);
        let mut app = test_app(store);
        app.handle_input(key(KeyCode::Char('2')));
        app.handle_input(key(KeyCode::Enter));
        assert_eq!(app.screen(), &Screen::Visits);
        assert!(app.visits().loading);

        settle(&mut app).await;
        let names: Vec<&str> = app.visits().rows.iter().map(|r| r.person_id.as_str()).collect();
        assert_eq!(names, ["high", "low"]);
    }

    #[tokio::test]
    async fn test_visit_filter_without_match() {
        let mut app = test_app(InMemoryStore::demo());
        app.handle_input(key(KeyCode::Char('2')));
        type_str(&mut app, "nobody");
        app.handle_input(key(KeyCode::Enter));
        settle(&mut app).await;
        assert_eq!(app.dialog(), Some(NO_RESULTS_MESSAGE));
    }
}

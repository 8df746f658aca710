//! Attendance kiosk - magstripe check-in terminal
//!
//! Swipes arrive as keystrokes (keyboard-wedge reader) or over a serial port,
//! are decoded into card ids, and checked in against a shared store without
//! blocking the screen.
//!
//! Module structure:
//! - `domain/` - Card records, check-in outcomes
//! - `io/` - Input sources (keyboard, serial reader)
//! - `services/` - Decoder, eligibility rules, coordinator, store workers
//! - `store/` - Store gateway (in-memory, Postgres)
//! - `ui/` - Screens and drawing
//! - `infra/` - Config, clock, logging

use attendance_kiosk::infra::logging::init_file_logging;
use attendance_kiosk::infra::{Config, ReaderSource, StoreBackend};
use attendance_kiosk::io::{spawn_keyboard_reader, InputEvent, SerialCardReader};
use attendance_kiosk::services::Session;
use attendance_kiosk::store::{InMemoryStore, PostgresStore, StoreGateway};
use attendance_kiosk::ui::{draw_ui, App};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Attendance kiosk - card swipe check-in terminal
#[derive(Parser, Debug)]
#[command(name = "attendance-kiosk", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/kiosk.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Use an in-memory store seeded with sample cards
    #[arg(long)]
    demo: bool,
}

/// Redraw interval while nothing else happens
const TICK: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let (mut config, load_error) = Config::load_with_fallback(&config_path);
    if args.demo {
        config = config.with_store_backend(StoreBackend::Memory);
    }

    init_file_logging(config.log_file())?;
    info!("attendance-kiosk starting");
    if let Some(e) = load_error {
        warn!(
            path = %config_path,
            error = %format!("{:#}", e),
            "config_load_failed_using_defaults"
        );
    }
    info!(
        config_file = %config.config_file(),
        store_backend = ?config.store_backend(),
        store_host = %config.store_host(),
        store_table = %config.store_table(),
        reader_source = ?config.reader_source(),
        cool_down_ms = %config.cool_down_ms(),
        allow_check_in_within_hour = %config.allow_check_in_within_hour(),
        "config_loaded"
    );

    let store: Arc<dyn StoreGateway> = match config.store_backend() {
        StoreBackend::Memory => Arc::new(InMemoryStore::demo()),
        StoreBackend::Postgres => Arc::new(PostgresStore::connect(&config).await?),
    };
    let session = Arc::new(Session::new(config.clone(), store));

    // Create shutdown signal for the serial reader
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (input_tx, mut input_rx) = mpsc::channel(256);
    if config.reader_source() == ReaderSource::Serial {
        let reader = SerialCardReader::new(&config, input_tx.clone());
        tokio::spawn(async move {
            reader.run(shutdown_rx).await;
        });
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let keyboard = spawn_keyboard_reader(input_tx);
    let mut app = App::new(session.clone());

    let result = run_ui(&mut terminal, &mut app, &mut input_rx).await;

    let _ = shutdown_tx.send(true);
    // Closing the receiver stops the keyboard thread at its next poll
    drop(input_rx);
    let _ = keyboard.await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.close().await;
    info!("attendance-kiosk shutdown complete");
    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    input_rx: &mut mpsc::Receiver<InputEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut tick = tokio::time::interval(TICK);

    loop {
        terminal.draw(|f| draw_ui(f, app))?;

        tokio::select! {
            input = input_rx.recv() => match input {
                Some(input) => app.handle_input(input),
                None => return Ok(()),
            },
            background = app.next_background() => app.apply_background(background),
            _ = tick.tick() => {}
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

//! Terminal key events
//!
//! Keyboard-wedge card readers type the track as ordinary key presses, so
//! swipes arrive on the same stream as operator input.

use super::InputEvent;
use crossterm::event::{self, Event, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read crossterm events on a blocking thread until the receiver is dropped
pub fn spawn_keyboard_reader(tx: mpsc::Sender<InputEvent>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        info!("keyboard_reader_started");
        while !tx.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, "keyboard_poll_error");
                    break;
                }
            }

            let input = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => InputEvent::Key(key),
                Ok(Event::Resize(_, _)) => InputEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "keyboard_read_error");
                    break;
                }
            };

            if tx.blocking_send(input).is_err() {
                break;
            }
        }
        info!("keyboard_reader_stopped");
    })
}

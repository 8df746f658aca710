//! IO modules - input sources for the kiosk
//!
//! - `keyboard` - terminal key events (keyboard-wedge readers type swipes)
//! - `serial_reader` - card readers attached to a UART

pub mod keyboard;
pub mod serial_reader;

use crossterm::event::KeyEvent;

/// Everything the foreground loop receives from input sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Raw character from a serial card reader
    ReaderChar(char),
    Resize,
}

// Re-export commonly used types
pub use keyboard::spawn_keyboard_reader;
pub use serial_reader::SerialCardReader;

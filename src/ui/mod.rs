//! Terminal front end
//!
//! - `app` - screen state machine, independent of the terminal
//! - `render` - ratatui drawing of the current screen

pub mod app;
pub mod render;

pub use app::{App, Background, Screen};
pub use render::draw_ui;

//! Infrastructure - configuration, clock and logging
//!
//! - `config` - application configuration (TOML loading, defaults)
//! - `clock` - wall-clock source for check-in timestamps
//! - `logging` - tracing subscriber setup

pub mod clock;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, ReaderSource, StoreBackend};

//! Services - check-in logic and orchestration
//!
//! - `swipe_decoder` - raw keystrokes to card ids
//! - `eligibility` - once-per-hour and clock-skew rules
//! - `coordinator` - single-outstanding-operation state machine
//! - `checkin_worker` - background store work (check-in, enrollment, standings)
//! - `session` - store, clock and config for one kiosk

pub mod checkin_worker;
pub mod coordinator;
pub mod eligibility;
pub mod session;
pub mod swipe_decoder;

// Re-export commonly used types
pub use coordinator::{Coordinator, CoordinatorEvent, CoordinatorState};
pub use eligibility::{evaluate, Eligibility};
pub use session::Session;
pub use swipe_decoder::SwipeDecoder;

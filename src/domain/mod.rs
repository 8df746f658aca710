//! Domain models - card records and check-in outcomes
//!
//! - `CardRecord` - an enrolled card/person pairing
//! - `CheckInOutcome` / `CheckInReport` - result of one attempt
//! - `CardId`, `PersonId` - identifier newtypes

pub mod outcome;
pub mod types;

pub use outcome::{CheckInOutcome, CheckInReport, CheckInStatus};
pub use types::{CardId, CardRecord, PersonId, VisitTotal};

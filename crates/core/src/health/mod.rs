//! Variant health ledger - failure memory and circuit breaking per variant.
//!
//! A variant becomes permanently dead once it has failed at least
//! `failure_threshold` times and its failures span at least
//! `dead_after_hours`. A burst of failures inside one bad network window
//! therefore never kills a variant. Successful playbacks are noted but never
//! lower the count; only [`VariantHealthLedger::reset`] does.

mod clock;
mod ledger;
mod types;

pub use clock::{Clock, SystemClock};
pub use ledger::VariantHealthLedger;
pub use types::{HealthTransition, VariantHealthRecord};

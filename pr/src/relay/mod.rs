//! Poll-and-deliver relay
//!
//! The relay reads the watermark, fetches one page of events, keeps the new
//! pushes to the target ref, commits the newest id, then posts each event to
//! the webhook in id order.

mod cycle;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use cycle::{CycleOutcome, CycleReport, PendingEvent, Relay, push_events_oldest_first, select_new_events};
pub use error::RelayError;

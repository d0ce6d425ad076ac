//! Persistence for engine state.
//!
//! - Open positions as CSV records, loaded at startup and saved after changes
//! - SQLite trade journal of fills and realized exits

mod journal;
mod store;

pub use journal::{JournalSummary, TradeJournal, TradeRecord};
pub use store::{CsvPositionStore, PositionStore};

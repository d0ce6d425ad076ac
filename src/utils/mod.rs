//! Shared utilities.

pub mod decimal;

pub use decimal::{mean, percent_change, round_down_to_dp};

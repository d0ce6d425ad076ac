//! Trading strategy implementation.
//!
//! Contains the core logic for:
//! - Kline window trend analysis
//! - Moving-average confirmation
//! - Market scanning across horizons
//! - Repurchase filtering of recently exited symbols

mod analyzer;
mod moving_average;
mod repurchase;
mod scanner;

pub use analyzer::{analyze_window, is_opportunity, RejectReason, TrendVerdict};
pub use moving_average::{is_superior_trend, median_sma, LONG_PERIOD, MIN_LEAD, SHORT_PERIOD};
pub use repurchase::RepurchaseGuard;
pub use scanner::{select_universe, OpportunityBuckets, OpportunityScanner, ScanOutcome, ScanReport};

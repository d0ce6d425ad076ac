//! # Kline Trend Trader
//!
//! A Rust trading engine that buys spot assets whose candles keep renewing
//! their highs and exits them on horizon-specific percentage stops.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `error`: Error kinds shared by the engine and its collaborators
//! - `exchange`: Market data model, collaborator traits, Binance REST client and mock
//! - `strategy`: Kline window analysis, moving-average filter, scanning, repurchase guard
//! - `risk`: Position model, per-position risk monitor and portfolio reconciler
//! - `events`: Trade event records and publishers
//! - `persistence`: Open-position store and SQLite trade journal
//! - `engine`: Engine state and the single decision loop
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod exchange;
pub mod persistence;
pub mod risk;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use error::{TradeError, TradeResult};

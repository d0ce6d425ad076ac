//! Exchange integrations for the trend trader.
//!
//! ## Binance
//! Spot REST connectivity for:
//! - Market data (24h tickers, klines)
//! - Market order placement
//!
//! ## Mock
//! Scripted in-memory data source and paper order gateway.

mod client;
pub mod mock;
mod traits;
mod types;

pub use client::BinanceClient;
pub use mock::MockExchange;
pub use traits::{MarketDataSource, OrderGateway};
pub use types::*;

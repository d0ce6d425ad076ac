//! Collaborator traits consumed by the engine.
//!
//! The engine never talks to an exchange directly; it receives these
//! capabilities at construction:
//! - `MarketDataSource` for tickers and candle history
//! - `OrderGateway` for market order placement
//!
//! Implementations own their retry and timeout policy and must return a
//! definite success or failure.

use super::types::{Candle, Interval, OrderRequest, OrderResult, Tick};
use crate::error::TradeResult;
use async_trait::async_trait;

/// Read-only market data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Snapshot of every listed symbol. Fails with `TradeError::Network`.
    async fn fetch_tickers(&self) -> TradeResult<Vec<Tick>>;

    /// Live quote for one symbol. Fails with `TradeError::Network`.
    async fn fetch_ticker(&self, symbol: &str) -> TradeResult<Tick>;

    /// The most recent `count` candles, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> TradeResult<Vec<Candle>>;
}

/// Order placement. Fails with `TradeError::Order`.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> TradeResult<OrderResult>;
}

//! In-memory exchange for tests and paper trading.
//!
//! Serves scripted tickers and candles, fills orders at the request's
//! reference price, and can be told to fail for specific symbols.

use super::traits::{MarketDataSource, OrderGateway};
use super::types::*;
use crate::error::{TradeError, TradeResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::info;

/// Mock client that simulates exchange responses.
#[derive(Default)]
pub struct MockExchange {
    tickers: RwLock<Vec<Tick>>,
    candles: RwLock<HashMap<(String, Interval), Vec<Candle>>>,
    /// Symbols whose ticker or candle requests fail
    failing_symbols: RwLock<HashSet<String>>,
    /// Symbols whose orders are rejected
    rejected_orders: RwLock<HashSet<String>>,
    /// Fail the full ticker snapshot
    tickers_down: AtomicBool,
    candle_requests: RwLock<Vec<(String, Interval, usize)>>,
    orders: RwLock<Vec<OrderRequest>>,
    order_id_counter: AtomicU64,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ticker snapshot.
    pub fn set_tickers(&self, tickers: Vec<Tick>) {
        if let Ok(mut guard) = self.tickers.write() {
            *guard = tickers;
        }
    }

    /// Update (or add) a single symbol's quote.
    pub fn set_ticker(&self, tick: Tick) {
        if let Ok(mut guard) = self.tickers.write() {
            match guard.iter_mut().find(|t| t.symbol == tick.symbol) {
                Some(existing) => *existing = tick,
                None => guard.push(tick),
            }
        }
    }

    /// Candle history served for a symbol and interval, oldest first.
    pub fn set_candles(&self, symbol: &str, interval: Interval, candles: Vec<Candle>) {
        if let Ok(mut guard) = self.candles.write() {
            guard.insert((symbol.to_string(), interval), candles);
        }
    }

    /// Make ticker and candle requests for `symbol` fail with a network error.
    pub fn fail_symbol(&self, symbol: &str) {
        if let Ok(mut guard) = self.failing_symbols.write() {
            guard.insert(symbol.to_string());
        }
    }

    pub fn restore_symbol(&self, symbol: &str) {
        if let Ok(mut guard) = self.failing_symbols.write() {
            guard.remove(symbol);
        }
    }

    /// Reject orders for `symbol` with an order error.
    pub fn reject_orders(&self, symbol: &str) {
        if let Ok(mut guard) = self.rejected_orders.write() {
            guard.insert(symbol.to_string());
        }
    }

    /// Toggle failure of the full ticker snapshot.
    pub fn set_tickers_down(&self, down: bool) {
        self.tickers_down.store(down, Ordering::SeqCst);
    }

    /// Orders accepted so far, in placement order.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.read().map(|o| o.clone()).unwrap_or_default()
    }

    /// Candle requests received so far: (symbol, interval, count).
    pub fn candle_requests(&self) -> Vec<(String, Interval, usize)> {
        self.candle_requests
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn is_failing(&self, symbol: &str) -> bool {
        self.failing_symbols
            .read()
            .map(|s| s.contains(symbol))
            .unwrap_or(false)
    }

    fn next_order_id(&self) -> i64 {
        self.order_id_counter.fetch_add(1, Ordering::SeqCst) as i64 + 1
    }
}

#[async_trait]
impl MarketDataSource for MockExchange {
    async fn fetch_tickers(&self) -> TradeResult<Vec<Tick>> {
        if self.tickers_down.load(Ordering::SeqCst) {
            return Err(TradeError::Network("ticker snapshot unavailable".into()));
        }
        Ok(self.tickers.read().map(|t| t.clone()).unwrap_or_default())
    }

    async fn fetch_ticker(&self, symbol: &str) -> TradeResult<Tick> {
        if self.is_failing(symbol) {
            return Err(TradeError::Network(format!("ticker for {} unavailable", symbol)));
        }
        self.tickers
            .read()
            .ok()
            .and_then(|t| t.iter().find(|t| t.symbol == symbol).cloned())
            .ok_or_else(|| TradeError::Network(format!("unknown symbol {}", symbol)))
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> TradeResult<Vec<Candle>> {
        if let Ok(mut guard) = self.candle_requests.write() {
            guard.push((symbol.to_string(), interval, count));
        }
        if self.is_failing(symbol) {
            return Err(TradeError::Network(format!("klines for {} unavailable", symbol)));
        }

        let candles = self
            .candles
            .read()
            .ok()
            .and_then(|c| c.get(&(symbol.to_string(), interval)).cloned())
            .unwrap_or_default();
        let skip = candles.len().saturating_sub(count);
        Ok(candles.into_iter().skip(skip).collect())
    }
}

#[async_trait]
impl OrderGateway for MockExchange {
    async fn place_order(&self, request: &OrderRequest) -> TradeResult<OrderResult> {
        let rejected = self
            .rejected_orders
            .read()
            .map(|s| s.contains(&request.symbol))
            .unwrap_or(false);
        if rejected {
            return Err(TradeError::Order(format!(
                "{} order for {} rejected",
                request.side, request.symbol
            )));
        }

        let order_id = self.next_order_id();
        if let Ok(mut guard) = self.orders.write() {
            guard.push(request.clone());
        }

        info!(
            order_id,
            symbol = %request.symbol,
            side = %request.side,
            quantity = %request.quantity,
            price = %request.reference_price,
            "Mock order executed"
        );

        Ok(OrderResult {
            order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            executed_qty: request.quantity,
            avg_price: request.reference_price,
        })
    }
}

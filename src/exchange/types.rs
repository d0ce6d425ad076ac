//! Market data model and Binance API response types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time granularity governing candle interval and risk threshold.
///
/// Declaration order is scan priority: a symbol qualifying at several
/// horizons in one scan is claimed by the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Day,
    Hour,
    Minute,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Day, Horizon::Hour, Horizon::Minute];

    /// Candle interval analyzed for this horizon.
    pub fn interval(&self) -> Interval {
        match self {
            Horizon::Day => Interval::Day,
            Horizon::Hour => Interval::Hour,
            Horizon::Minute => Interval::Minute,
        }
    }

    /// Number of candles in the analysis window.
    pub fn period(&self, days_to_analyze: usize) -> usize {
        match self {
            Horizon::Day => days_to_analyze + 1,
            Horizon::Hour | Horizon::Minute => 3,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Day => write!(f, "day"),
            Horizon::Hour => write!(f, "hour"),
            Horizon::Minute => write!(f, "minute"),
        }
    }
}

impl std::str::FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Horizon::Day),
            "hour" => Ok(Horizon::Hour),
            "minute" => Ok(Horizon::Minute),
            other => Err(format!("unknown horizon: {}", other)),
        }
    }
}

/// Candle interval unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Day,
    Hour,
    Minute,
}

impl Interval {
    /// Binance interval code.
    pub fn as_binance(&self) -> &'static str {
        match self {
            Interval::Day => "1d",
            Interval::Hour => "1h",
            Interval::Minute => "1m",
        }
    }
}

/// Point-in-time market quote for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub ask_price: Decimal,
    pub bid_price: Decimal,
    /// 24h price change in percent
    pub price_change_percent: Decimal,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, ask_price: Decimal, bid_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            ask_price,
            bid_price,
            price_change_percent: Decimal::ZERO,
        }
    }
}

/// Open-high-low-close summary over one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub interval: Interval,
    pub open_time: DateTime<Utc>,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// Midpoint of the candle range.
    pub fn median_price(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Market order request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Price the decision was made at; paper fills execute here
    pub reference_price: Decimal,
}

/// Outcome of a filled order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub order_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub executed_qty: Decimal,
    pub avg_price: Decimal,
}

// ==================== Binance wire types ====================

/// 24-hour spot ticker statistics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_change_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub last_price: Decimal,
}

impl From<Ticker24h> for Tick {
    fn from(t: Ticker24h) -> Self {
        Tick {
            symbol: t.symbol,
            ask_price: t.ask_price,
            bid_price: t.bid_price,
            price_change_percent: t.price_change_percent,
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    ExpiredInMatch,
}

/// Spot order response (FULL or RESULT response type).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    pub symbol: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub cummulative_quote_qty: Decimal,
    pub side: OrderSide,
}

/// Error body returned by Binance on rejected requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_horizon_periods() {
        assert_eq!(Horizon::Day.period(5), 6);
        assert_eq!(Horizon::Hour.period(5), 3);
        assert_eq!(Horizon::Minute.period(30), 3);
    }

    #[test]
    fn test_horizon_priority_order() {
        let mut horizons = vec![Horizon::Minute, Horizon::Day, Horizon::Hour];
        horizons.sort();
        assert_eq!(horizons, Horizon::ALL.to_vec());
    }

    #[test]
    fn test_horizon_round_trips_through_display() {
        for horizon in Horizon::ALL {
            assert_eq!(horizon.to_string().parse::<Horizon>(), Ok(horizon));
        }
        assert!("week".parse::<Horizon>().is_err());
    }

    #[test]
    fn test_ticker_parses_into_tick() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "priceChange": "512.10",
            "priceChangePercent": "1.234",
            "lastPrice": "42010.00",
            "bidPrice": "42009.99",
            "askPrice": "42010.01",
            "volume": "1000"
        }"#;
        let ticker: Ticker24h = serde_json::from_str(json).unwrap();
        let tick = Tick::from(ticker);
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.ask_price, dec!(42010.01));
        assert_eq!(tick.bid_price, dec!(42009.99));
        assert_eq!(tick.price_change_percent, dec!(1.234));
    }

    #[test]
    fn test_candle_median_price() {
        let candle = Candle {
            symbol: "ETHUSDT".into(),
            interval: Interval::Hour,
            open_time: Utc::now(),
            high: dec!(110),
            low: dec!(90),
            close: dec!(100),
        };
        assert_eq!(candle.median_price(), dec!(100));
    }
}

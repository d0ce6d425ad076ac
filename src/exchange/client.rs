//! Binance spot REST API client.

use crate::config::BinanceConfig;
use crate::error::{TradeError, TradeResult};
use crate::exchange::traits::{MarketDataSource, OrderGateway};
use crate::exchange::types::*;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, instrument};

/// Binance API client for the spot market.
pub struct BinanceClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client from configuration.
    pub fn new(config: &BinanceConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether signed endpoints can be used.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty()
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(&self, query_string: &str) -> TradeResult<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| TradeError::Order(format!("Invalid secret key: {}", e)))?;
        mac.update(query_string.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Decode a JSON body, surfacing Binance error payloads.
    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> TradeResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| format!("code {}: {}", e.code, e.msg))
                .unwrap_or(body);
            return Err(TradeError::Network(format!(
                "{} failed with {}: {}",
                what, status, detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TradeError::Network(format!("Failed to parse {} response: {}", what, e)))
    }

    // ==================== Market Data (Public) ====================

    /// Get 24-hour ticker for all symbols.
    #[instrument(skip(self))]
    pub async fn get_24h_tickers(&self) -> TradeResult<Vec<Ticker24h>> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let response = self.http.get(&url).send().await?;
        Self::decode(response, "24h tickers").await
    }

    /// Get 24-hour ticker for a single symbol.
    #[instrument(skip(self))]
    pub async fn get_24h_ticker(&self, symbol: &str) -> TradeResult<Ticker24h> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?;
        Self::decode(response, "24h ticker").await
    }

    /// Get the most recent klines for a symbol, oldest first.
    #[instrument(skip(self))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> TradeResult<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.clamp(1, 1000).to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval.as_binance()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let rows: Vec<Vec<serde_json::Value>> = Self::decode(response, "klines").await?;
        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| parse_kline_row(symbol, interval, row))
            .collect();

        debug!(symbol, rows = rows.len(), parsed = candles.len(), "Fetched klines");
        Ok(candles)
    }

    // ==================== Orders (Authenticated) ====================

    /// Place a spot market order.
    #[instrument(skip(self))]
    pub async fn place_market_order(&self, request: &OrderRequest) -> TradeResult<OrderResponse> {
        if !self.has_credentials() {
            return Err(TradeError::Order(
                "API credentials required to place orders".to_string(),
            ));
        }

        let params = vec![
            ("symbol".to_string(), request.symbol.clone()),
            ("side".to_string(), request.side.to_string()),
            ("type".to_string(), "MARKET".to_string()),
            ("quantity".to_string(), request.quantity.normalize().to_string()),
            ("newOrderRespType".to_string(), "RESULT".to_string()),
            ("timestamp".to_string(), Utc::now().timestamp_millis().to_string()),
        ];

        let query_string: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let signature = self.sign(&query_string)?;
        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            self.base_url, query_string, signature
        );

        debug!("Placing spot order: {:?}", request);

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| TradeError::Order(format!("Failed to place order: {}", e)))?;

        Self::decode(response, "order")
            .await
            .map_err(|e| TradeError::Order(e.to_string()))
    }
}

/// Parse a single kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_kline_row(symbol: &str, interval: Interval, row: &[serde_json::Value]) -> Option<Candle> {
    if row.len() < 7 {
        return None;
    }

    let open_time = DateTime::from_timestamp_millis(row[0].as_i64()?)?;

    Some(Candle {
        symbol: symbol.to_string(),
        interval,
        open_time,
        high: row[2].as_str()?.parse().ok()?,
        low: row[3].as_str()?.parse().ok()?,
        close: row[4].as_str()?.parse().ok()?,
    })
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_tickers(&self) -> TradeResult<Vec<Tick>> {
        Ok(self
            .get_24h_tickers()
            .await?
            .into_iter()
            .map(Tick::from)
            .collect())
    }

    async fn fetch_ticker(&self, symbol: &str) -> TradeResult<Tick> {
        self.get_24h_ticker(symbol).await.map(Tick::from)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> TradeResult<Vec<Candle>> {
        self.get_klines(symbol, interval, count).await
    }
}

#[async_trait]
impl OrderGateway for BinanceClient {
    async fn place_order(&self, request: &OrderRequest) -> TradeResult<OrderResult> {
        let response = self.place_market_order(request).await?;

        if !matches!(
            response.status,
            OrderStatus::Filled | OrderStatus::PartiallyFilled
        ) || response.executed_qty <= Decimal::ZERO
        {
            return Err(TradeError::Order(format!(
                "Order {} not filled: {:?}",
                response.order_id, response.status
            )));
        }

        let avg_price = response
            .cummulative_quote_qty
            .checked_div(response.executed_qty)
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or(request.reference_price);

        Ok(OrderResult {
            order_id: response.order_id,
            symbol: response.symbol,
            side: response.side,
            executed_qty: response.executed_qty,
            avg_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, with_keys: bool) -> BinanceClient {
        let config = BinanceConfig {
            api_key: if with_keys { "key".into() } else { String::new() },
            secret_key: if with_keys { "secret".into() } else { String::new() },
            base_url: server.uri(),
        };
        BinanceClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_kline_row() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            r#"[1700000000000,"100.0","110.5","95.25","105.0","1234.5",1700003599999,"0",10,"0","0","0"]"#,
        )
        .unwrap();
        let candle = parse_kline_row("BTCUSDT", Interval::Hour, &row).unwrap();
        assert_eq!(candle.high, dec!(110.5));
        assert_eq!(candle.low, dec!(95.25));
        assert_eq!(candle.close, dec!(105.0));
        assert_eq!(candle.open_time.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_parse_kline_row_rejects_short_rows() {
        let row: Vec<serde_json::Value> = serde_json::from_str(r#"[1700000000000,"1"]"#).unwrap();
        assert!(parse_kline_row("BTCUSDT", Interval::Day, &row).is_none());
    }

    #[tokio::test]
    async fn test_fetch_candles_maps_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .and(query_param("symbol", "ETHUSDT"))
            .and(query_param("interval", "1d"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [1700000000000i64, "1", "2", "0.5", "1.5", "10", 1700086399999i64],
                [1700086400000i64, "1.5", "2.5", "1.2", "2.2", "12", 1700172799999i64]
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let candles = client
            .fetch_candles("ETHUSDT", Interval::Day, 2)
            .await
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].high, dec!(2));
        assert_eq!(candles[1].high, dec!(2.5));
        assert!(candles[0].open_time < candles[1].open_time);
    }

    #[tokio::test]
    async fn test_fetch_ticker_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"code": -1121, "msg": "Invalid symbol."})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let err = client.fetch_ticker("NOPE").await.unwrap_err();
        match err {
            TradeError::Network(msg) => assert!(msg.contains("Invalid symbol")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_place_order_computes_average_price() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/order"))
            .and(header("X-MBX-APIKEY", "key"))
            .and(query_param("side", "BUY"))
            .and(query_param("type", "MARKET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "BTCUSDT",
                "orderId": 42,
                "status": "FILLED",
                "executedQty": "0.5",
                "cummulativeQuoteQty": "50.5",
                "side": "BUY"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let result = client
            .place_order(&OrderRequest {
                symbol: "BTCUSDT".into(),
                side: OrderSide::Buy,
                quantity: dec!(0.5),
                reference_price: dec!(100),
            })
            .await
            .unwrap();
        assert_eq!(result.order_id, 42);
        assert_eq!(result.avg_price, dec!(101));
        assert_eq!(result.executed_qty, dec!(0.5));
    }

    #[tokio::test]
    async fn test_place_order_without_credentials_fails() {
        let server = MockServer::start().await;
        let client = client_for(&server, false);
        let err = client
            .place_order(&OrderRequest {
                symbol: "BTCUSDT".into(),
                side: OrderSide::Sell,
                quantity: dec!(1),
                reference_price: dec!(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Order(_)));
    }
}

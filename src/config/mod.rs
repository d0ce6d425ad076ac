//! Configuration management for the kline trend trader.
//!
//! Loads settings from environment variables and config files.

use crate::exchange::Horizon;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Binance API credentials
    #[serde(default)]
    pub binance: BinanceConfig,
    /// Opportunity detection settings
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Risk management parameters
    #[serde(default)]
    pub risk: RiskConfig,
    /// Execution parameters
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Storage locations
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Event publishing
    #[serde(default)]
    pub publisher: PublisherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key for signing requests
    #[serde(default)]
    pub secret_key: String,
    /// REST base URL (overridable for testnet)
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Daily candles analyzed before today (window = days + 1)
    #[serde(default = "default_days_to_analyze")]
    pub days_to_analyze: usize,
    /// Horizons scanned each cycle, in priority order
    #[serde(default = "default_horizons")]
    pub horizons: Vec<Horizon>,
    /// Require the short moving average to lead the long one
    #[serde(default)]
    pub moving_average_filter: bool,
    /// Only symbols quoted in this asset are scanned
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Concurrent candle requests per horizon
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop threshold (percent, negative) for day positions
    #[serde(default = "default_day_threshold")]
    pub day_threshold: Decimal,
    /// Stop threshold (percent, negative) for hour positions
    #[serde(default = "default_hour_threshold")]
    pub hour_threshold: Decimal,
    /// Stop threshold (percent, negative) for minute positions
    #[serde(default = "default_minute_threshold")]
    pub minute_threshold: Decimal,
    /// Recovery (percent above exit price) required before re-entry
    #[serde(default = "default_repurchase_recovery")]
    pub repurchase_recovery_pct: Decimal,
    /// How long exited positions are remembered by the repurchase guard
    #[serde(default = "default_exit_memory_hours")]
    pub exit_memory_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Quote currency spent per new position
    #[serde(default = "default_order_value")]
    pub order_value: Decimal,
    /// Maximum concurrent open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Decimal places kept on order quantities
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    /// Seconds between decision cycles
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Simulate fills instead of sending orders
    #[serde(default)]
    pub paper_trading: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Open positions, one delimited record per position
    #[serde(default = "default_positions_path")]
    pub positions_path: String,
    /// SQLite trade journal
    #[serde(default = "default_journal_path")]
    pub journal_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Webhook receiving trade events (log-only when unset)
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Delivery attempts per event
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, multiplied by the attempt number
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

// Default value functions
fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_days_to_analyze() -> usize {
    5
}

fn default_horizons() -> Vec<Horizon> {
    vec![Horizon::Day, Horizon::Hour, Horizon::Minute]
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_day_threshold() -> Decimal {
    Decimal::new(-30, 1) // -3.0%
}

fn default_hour_threshold() -> Decimal {
    Decimal::new(-20, 1) // -2.0%
}

fn default_minute_threshold() -> Decimal {
    Decimal::new(-14, 1) // -1.4%
}

fn default_repurchase_recovery() -> Decimal {
    Decimal::ONE // 1%
}

fn default_exit_memory_hours() -> u32 {
    24
}

fn default_order_value() -> Decimal {
    Decimal::new(50, 0) // 50 USDT
}

fn default_max_open_positions() -> usize {
    5
}

fn default_quantity_precision() -> u32 {
    4
}

fn default_tick_interval() -> u64 {
    60
}

fn default_positions_path() -> String {
    "data/positions.csv".to_string()
}

fn default_journal_path() -> String {
    "data/journal.db".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("KTT"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.strategy.days_to_analyze >= 1,
            "days_to_analyze must be at least 1"
        );

        anyhow::ensure!(
            !self.strategy.horizons.is_empty(),
            "at least one horizon must be enabled"
        );

        anyhow::ensure!(
            self.strategy.fetch_concurrency >= 1,
            "fetch_concurrency must be at least 1"
        );

        for (name, threshold) in [
            ("day_threshold", self.risk.day_threshold),
            ("hour_threshold", self.risk.hour_threshold),
            ("minute_threshold", self.risk.minute_threshold),
        ] {
            anyhow::ensure!(threshold < Decimal::ZERO, "{} must be negative", name);
        }

        anyhow::ensure!(
            self.execution.order_value > Decimal::ZERO,
            "order_value must be positive"
        );

        anyhow::ensure!(
            self.execution.tick_interval_secs > 0,
            "tick_interval_secs must be positive"
        );

        Ok(())
    }
}

impl RiskConfig {
    /// Stop threshold for a horizon, fixed at position creation.
    pub fn threshold_for(&self, horizon: Horizon) -> Decimal {
        match horizon {
            Horizon::Day => self.day_threshold,
            Horizon::Hour => self.hour_threshold,
            Horizon::Minute => self.minute_threshold,
        }
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            days_to_analyze: default_days_to_analyze(),
            horizons: default_horizons(),
            moving_average_filter: false,
            quote_asset: default_quote_asset(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            day_threshold: default_day_threshold(),
            hour_threshold: default_hour_threshold(),
            minute_threshold: default_minute_threshold(),
            repurchase_recovery_pct: default_repurchase_recovery(),
            exit_memory_hours: default_exit_memory_hours(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            order_value: default_order_value(),
            max_open_positions: default_max_open_positions(),
            quantity_precision: default_quantity_precision(),
            tick_interval_secs: default_tick_interval(),
            paper_trading: false,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            positions_path: default_positions_path(),
            journal_path: default_journal_path(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_day_threshold_tolerates_deeper_pullback() {
        let risk = RiskConfig::default();
        assert!(risk.threshold_for(Horizon::Day) < risk.threshold_for(Horizon::Hour));
        assert!(risk.threshold_for(Horizon::Hour) < risk.threshold_for(Horizon::Minute));
        assert_eq!(risk.threshold_for(Horizon::Minute), dec!(-1.4));
    }

    #[test]
    fn test_positive_threshold_rejected() {
        let mut config = Config::default();
        config.risk.hour_threshold = dec!(0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_order_value_rejected() {
        let mut config = Config::default();
        config.execution.order_value = Decimal::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("order_value"));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = Config::default();
        config.execution.tick_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_interval_secs"));
    }

    #[test]
    fn test_zero_days_to_analyze_rejected() {
        let mut config = Config::default();
        config.strategy.days_to_analyze = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("days_to_analyze"));
    }

    #[test]
    fn test_empty_horizons_rejected() {
        let mut config = Config::default();
        config.strategy.horizons.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_horizons_deserialize_from_toml_names() {
        let source = config::Config::builder()
            .add_source(config::File::from_str(
                "[strategy]\nhorizons = [\"hour\", \"minute\"]\nmoving_average_filter = true\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: Config = source.try_deserialize().unwrap();
        assert_eq!(config.strategy.horizons, vec![Horizon::Hour, Horizon::Minute]);
        assert!(config.strategy.moving_average_filter);
        assert_eq!(config.strategy.days_to_analyze, 5);
    }
}

//! Open-position store backed by a CSV file.

use crate::config::RiskConfig;
use crate::error::TradeResult;
use crate::exchange::Horizon;
use crate::risk::Position;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load/save pair for the open-position set.
pub trait PositionStore: Send + Sync {
    fn load(&self) -> TradeResult<Vec<Position>>;
    fn save(&self, positions: &[Position]) -> TradeResult<()>;
}

/// One row per open position.
///
/// The first eight columns are required; the trailing ones are optional so
/// files written with only the required columns still load.
#[derive(Debug, Serialize, Deserialize)]
struct PositionRecord {
    symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    last_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    entry_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    last_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    valorization: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    horizon: Horizon,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    high_water_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    risk_threshold: Option<Decimal>,
    #[serde(default)]
    minute_counter: Option<u32>,
    #[serde(default)]
    opened_at: Option<DateTime<Utc>>,
}

impl From<&Position> for PositionRecord {
    fn from(p: &Position) -> Self {
        Self {
            symbol: p.symbol.clone(),
            entry_price: p.entry_price,
            last_price: p.current_price,
            entry_value: p.entry_value,
            last_value: p.current_value,
            valorization: p.valorization,
            quantity: p.quantity,
            horizon: p.horizon,
            high_water_price: Some(p.high_water_price),
            risk_threshold: Some(p.risk_threshold),
            minute_counter: Some(p.minute_counter),
            opened_at: Some(p.opened_at),
        }
    }
}

/// CSV file store; saves replace the file atomically.
pub struct CsvPositionStore {
    path: PathBuf,
    risk: RiskConfig,
}

impl CsvPositionStore {
    /// `risk` supplies thresholds for rows written without one.
    pub fn new(path: impl AsRef<Path>, risk: RiskConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            risk,
        }
    }

    fn position_from(&self, r: PositionRecord) -> Position {
        Position {
            high_water_price: r.high_water_price.unwrap_or(r.last_price),
            risk_threshold: r
                .risk_threshold
                .unwrap_or_else(|| self.risk.threshold_for(r.horizon)),
            minute_counter: r.minute_counter.unwrap_or(0),
            opened_at: r.opened_at.unwrap_or_else(Utc::now),
            symbol: r.symbol,
            horizon: r.horizon,
            entry_price: r.entry_price,
            current_price: r.last_price,
            quantity: r.quantity,
            entry_value: r.entry_value,
            current_value: r.last_value,
            valorization: r.valorization,
        }
    }
}

impl PositionStore for CsvPositionStore {
    fn load(&self) -> TradeResult<Vec<Position>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No position file, starting flat");
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut positions = Vec::new();
        for row in reader.deserialize() {
            let record: PositionRecord = row?;
            positions.push(self.position_from(record));
        }

        info!(path = %self.path.display(), positions = positions.len(), "Loaded open positions");
        Ok(positions)
    }

    fn save(&self, positions: &[Position]) -> TradeResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for position in positions {
                writer.serialize(PositionRecord::from(position))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), positions = positions.len(), "Saved open positions");
        Ok(())
    }
}

//! Open and closed position records.

use crate::error::{TradeError, TradeResult};
use crate::exchange::Horizon;
use crate::utils::percent_change;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Change since entry fell below the risk threshold
    TotalLoss,
    /// Single-tick change fell below the risk threshold
    SharpDrop,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TotalLoss => write!(f, "total_loss"),
            ExitReason::SharpDrop => write!(f, "sharp_drop"),
        }
    }
}

impl std::str::FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_loss" => Ok(ExitReason::TotalLoss),
            "sharp_drop" => Ok(ExitReason::SharpDrop),
            other => Err(format!("unknown exit reason: {}", other)),
        }
    }
}

/// A held position, updated every tick by the risk monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub horizon: Horizon,
    pub entry_price: Decimal,
    /// Last price the position ratcheted up to
    pub current_price: Decimal,
    pub high_water_price: Decimal,
    pub quantity: Decimal,
    pub entry_value: Decimal,
    pub current_value: Decimal,
    /// Cumulative percent gain across upward ticks
    pub valorization: Decimal,
    /// Stop threshold in percent, fixed at creation
    pub risk_threshold: Decimal,
    /// Upward ticks recorded since entry
    pub minute_counter: u32,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Open a position from a filled buy.
    pub fn open(
        symbol: impl Into<String>,
        horizon: Horizon,
        entry_price: Decimal,
        quantity: Decimal,
        risk_threshold: Decimal,
        opened_at: DateTime<Utc>,
    ) -> TradeResult<Self> {
        let symbol = symbol.into();
        if entry_price <= Decimal::ZERO || quantity <= Decimal::ZERO {
            return Err(TradeError::Order(format!(
                "cannot open {} at price {} with quantity {}",
                symbol, entry_price, quantity
            )));
        }

        let entry_value = entry_price * quantity;
        Ok(Self {
            symbol,
            horizon,
            entry_price,
            current_price: entry_price,
            high_water_price: entry_price,
            quantity,
            entry_value,
            current_value: entry_value,
            valorization: Decimal::ZERO,
            risk_threshold,
            minute_counter: 0,
            opened_at,
        })
    }

    /// Percent change of `price` against the entry price.
    pub fn total_change(&self, price: Decimal) -> Option<Decimal> {
        percent_change(price, self.entry_price)
    }

    /// Record of this position after selling at `exit_price`.
    pub fn close(
        &self,
        exit_price: Decimal,
        reason: ExitReason,
        closed_at: DateTime<Utc>,
    ) -> ClosedPosition {
        ClosedPosition {
            symbol: self.symbol.clone(),
            horizon: self.horizon,
            entry_price: self.entry_price,
            exit_price,
            quantity: self.quantity,
            valorization: self.total_change(exit_price).unwrap_or(Decimal::ZERO),
            reason,
            closed_at,
        }
    }
}

/// A sold position, remembered for repurchase decisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedPosition {
    pub symbol: String,
    pub horizon: Horizon,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    /// Realized percent change from entry to exit
    pub valorization: Decimal,
    pub reason: ExitReason,
    pub closed_at: DateTime<Utc>,
}

impl ClosedPosition {
    /// Realized profit in quote currency.
    pub fn pnl(&self) -> Decimal {
        (self.exit_price - self.entry_price) * self.quantity
    }
}

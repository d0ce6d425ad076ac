//! Per-tick HOLD/EXIT decisions for a single position.

use super::position::{ExitReason, Position};
use crate::utils::percent_change;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Outcome of evaluating one position against a live ask.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    /// Keep the position; carries the (possibly updated) snapshot
    Hold(Position),
    /// Sell the position
    Exit {
        position: Position,
        reason: ExitReason,
        current_change: Decimal,
        total_change: Decimal,
    },
}

impl RiskDecision {
    pub fn is_exit(&self) -> bool {
        matches!(self, RiskDecision::Exit { .. })
    }
}

/// Stateless stop-rule evaluator.
///
/// Upward moves ratchet the tracked price and never sell. Flat or
/// downward moves sell when either the change since entry or the change
/// since the last ratchet is below the position's threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionRiskMonitor;

impl PositionRiskMonitor {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, position: &Position, ask: Decimal) -> RiskDecision {
        if ask <= Decimal::ZERO {
            warn!(symbol = %position.symbol, %ask, "Ignoring non-positive ask");
            return RiskDecision::Hold(position.clone());
        }

        let current_change = match percent_change(ask, position.current_price) {
            Some(change) => change,
            None => {
                warn!(symbol = %position.symbol, "Position has zero tracked price");
                return RiskDecision::Hold(position.clone());
            }
        };

        if current_change > Decimal::ZERO {
            let mut updated = position.clone();
            updated.current_price = ask;
            updated.current_value = ask * updated.quantity;
            updated.valorization += current_change;
            updated.high_water_price = updated.high_water_price.max(ask);
            updated.minute_counter += 1;
            debug!(
                symbol = %updated.symbol,
                price = %ask,
                change = %current_change.round_dp(4),
                valorization = %updated.valorization.round_dp(4),
                "Position ratcheted up"
            );
            return RiskDecision::Hold(updated);
        }

        let total_change = position.total_change(ask).unwrap_or(Decimal::ZERO);
        let threshold = position.risk_threshold;

        let reason = if total_change < threshold {
            Some(ExitReason::TotalLoss)
        } else if current_change < threshold {
            Some(ExitReason::SharpDrop)
        } else {
            None
        };

        match reason {
            Some(reason) => RiskDecision::Exit {
                position: position.clone(),
                reason,
                current_change,
                total_change,
            },
            None => {
                debug!(
                    symbol = %position.symbol,
                    price = %ask,
                    current_change = %current_change.round_dp(4),
                    total_change = %total_change.round_dp(4),
                    threshold = %threshold,
                    "Holding through pullback"
                );
                RiskDecision::Hold(position.clone())
            }
        }
    }
}

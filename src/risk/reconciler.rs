//! Reconciles the open-position set against live quotes once per tick.

use super::monitor::{PositionRiskMonitor, RiskDecision};
use super::position::{ClosedPosition, Position};
use crate::exchange::{MarketDataSource, OrderGateway, OrderRequest, OrderSide, Tick};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    /// Positions still held, in their original order
    pub open: Vec<Position>,
    /// Last ticks of exited symbols
    pub resume_monitoring: Vec<Tick>,
    pub exits: Vec<ClosedPosition>,
    /// Exits that failed to sell and were retained
    pub failed_sells: usize,
    /// Positions left unevaluated after the pass stopped
    pub deferred: usize,
}

/// Runs the risk monitor across all open positions.
///
/// A pass stops at the first successful sell; positions after it are
/// carried over unchanged and evaluated on the next tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioReconciler {
    monitor: PositionRiskMonitor,
}

impl PortfolioReconciler {
    pub fn new(monitor: PositionRiskMonitor) -> Self {
        Self { monitor }
    }

    #[instrument(skip_all, fields(positions = positions.len()))]
    pub async fn reconcile(
        &self,
        positions: Vec<Position>,
        source: &dyn MarketDataSource,
        gateway: &dyn OrderGateway,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut remaining = positions.into_iter();

        while let Some(position) = remaining.next() {
            let tick = match source.fetch_ticker(&position.symbol).await {
                Ok(tick) => tick,
                Err(e) => {
                    warn!(symbol = %position.symbol, error = %e, "Live quote unavailable, keeping position");
                    outcome.open.push(position);
                    continue;
                }
            };

            let (position, reason, total_change) =
                match self.monitor.evaluate(&position, tick.ask_price) {
                    RiskDecision::Hold(updated) => {
                        outcome.open.push(updated);
                        continue;
                    }
                    RiskDecision::Exit {
                        position,
                        reason,
                        total_change,
                        ..
                    } => (position, reason, total_change),
                };

            let reference_price = if tick.bid_price > Decimal::ZERO {
                tick.bid_price
            } else {
                tick.ask_price
            };
            let request = OrderRequest {
                symbol: position.symbol.clone(),
                side: OrderSide::Sell,
                quantity: position.quantity,
                reference_price,
            };

            match gateway.place_order(&request).await {
                Ok(fill) => {
                    let closed = position.close(fill.avg_price, reason, Utc::now());
                    info!(
                        symbol = %closed.symbol,
                        horizon = %closed.horizon,
                        %reason,
                        entry = %closed.entry_price,
                        exit = %closed.exit_price,
                        total_change = %total_change.round_dp(4),
                        valorization = %closed.valorization.round_dp(4),
                        order_id = fill.order_id,
                        "🔻 Position exited"
                    );
                    outcome.exits.push(closed);
                    outcome.resume_monitoring.push(tick);

                    // One sell per pass.
                    let deferred: Vec<Position> = remaining.by_ref().collect();
                    outcome.deferred = deferred.len();
                    outcome.open.extend(deferred);
                    break;
                }
                Err(e) => {
                    error!(symbol = %position.symbol, %reason, error = %e, "Sell failed, position retained");
                    outcome.failed_sells += 1;
                    outcome.open.push(position);
                }
            }
        }

        outcome
    }
}

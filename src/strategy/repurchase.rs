//! Repurchase guard: no re-entry before a symbol recovers from its exit.

use crate::exchange::Tick;
use crate::risk::ClosedPosition;
use crate::utils::percent_change;
use rust_decimal::Decimal;
use tracing::debug;

pub struct RepurchaseGuard {
    /// Percent above the exit price the ask must exceed
    min_recovery_pct: Decimal,
}

impl RepurchaseGuard {
    pub fn new(min_recovery_pct: Decimal) -> Self {
        Self { min_recovery_pct }
    }

    /// Drop ticks whose symbol was exited and has not recovered past the margin.
    ///
    /// Survivors keep their relative order.
    pub fn filter(&self, bucket: Vec<Tick>, recent_exits: &[ClosedPosition]) -> Vec<Tick> {
        bucket
            .into_iter()
            .filter(|tick| self.allows(tick, recent_exits))
            .collect()
    }

    fn allows(&self, tick: &Tick, recent_exits: &[ClosedPosition]) -> bool {
        let Some(exit) = recent_exits
            .iter()
            .filter(|c| c.symbol == tick.symbol)
            .max_by_key(|c| c.closed_at)
        else {
            return true;
        };

        // A zero exit price cannot be compared, so the tick passes.
        let Some(recovery) = percent_change(tick.ask_price, exit.exit_price) else {
            return true;
        };

        if recovery <= self.min_recovery_pct {
            debug!(
                symbol = %tick.symbol,
                ask = %tick.ask_price,
                exit_price = %exit.exit_price,
                recovery = %recovery.round_dp(4),
                "Repurchase blocked"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Horizon;
    use crate::risk::ExitReason;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn exit(symbol: &str, price: Decimal, minutes_ago: i64) -> ClosedPosition {
        ClosedPosition {
            symbol: symbol.into(),
            horizon: Horizon::Hour,
            entry_price: dec!(110),
            exit_price: price,
            quantity: dec!(1),
            valorization: dec!(-5),
            reason: ExitReason::TotalLoss,
            closed_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn tick(symbol: &str, ask: Decimal) -> Tick {
        Tick::new(symbol, ask, ask)
    }

    #[test]
    fn test_exactly_one_percent_recovery_is_dropped() {
        let guard = RepurchaseGuard::new(dec!(1));
        let kept = guard.filter(vec![tick("BTCUSDT", dec!(101))], &[exit("BTCUSDT", dec!(100), 5)]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_recovery_above_margin_passes() {
        let guard = RepurchaseGuard::new(dec!(1));
        let kept = guard.filter(vec![tick("BTCUSDT", dec!(101.01))], &[exit("BTCUSDT", dec!(100), 5)]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_unknown_symbols_pass_and_order_is_preserved() {
        let guard = RepurchaseGuard::new(dec!(1));
        let bucket = vec![
            tick("AUSDT", dec!(10)),
            tick("BUSDT", dec!(100)),
            tick("CUSDT", dec!(5)),
        ];
        let kept = guard.filter(bucket, &[exit("BUSDT", dec!(100), 5)]);
        let symbols: Vec<&str> = kept.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AUSDT", "CUSDT"]);
    }

    #[test]
    fn test_most_recent_exit_is_used() {
        let guard = RepurchaseGuard::new(dec!(1));
        // Older exit at 50 would allow, latest exit at 100 blocks.
        let exits = vec![exit("BTCUSDT", dec!(100), 1), exit("BTCUSDT", dec!(50), 120)];
        assert!(guard.filter(vec![tick("BTCUSDT", dec!(100.5))], &exits).is_empty());

        let exits = vec![exit("BTCUSDT", dec!(100), 120), exit("BTCUSDT", dec!(50), 1)];
        assert_eq!(guard.filter(vec![tick("BTCUSDT", dec!(100.5))], &exits).len(), 1);
    }
}

//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Percentage change from `from` to `to`, e.g. 100 -> 95 is -5.
///
/// Returns `None` when `from` is zero.
pub fn percent_change(to: Decimal, from: Decimal) -> Option<Decimal> {
    if from == Decimal::ZERO {
        return None;
    }
    Some((to - from) / from * dec!(100))
}

/// Round a quantity down to a number of decimal places.
pub fn round_down_to_dp(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, rust_decimal::RoundingStrategy::ToZero)
}

/// Simple arithmetic mean.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len()))
}

//! Moving-average confirmation filter.

use crate::error::{TradeError, TradeResult};
use crate::exchange::Candle;
use crate::utils::mean;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const SHORT_PERIOD: usize = 5;
pub const LONG_PERIOD: usize = 10;
/// Required lead of the short average over the long one (1%).
pub const MIN_LEAD: Decimal = dec!(0.01);

/// Simple moving average of `(high + low) / 2` over the trailing `period` candles.
pub fn median_sma(candles: &[Candle], period: usize) -> TradeResult<Decimal> {
    if period == 0 || candles.len() < period {
        return Err(TradeError::InsufficientData {
            required: period.max(1),
            available: candles.len(),
        });
    }

    let medians: Vec<Decimal> = candles[candles.len() - period..]
        .iter()
        .map(Candle::median_price)
        .collect();

    mean(&medians).ok_or(TradeError::InsufficientData {
        required: period,
        available: 0,
    })
}

/// True iff the 5-period average leads the 10-period average by more than 1%.
pub fn is_superior_trend(candles: &[Candle]) -> TradeResult<bool> {
    let short = median_sma(candles, SHORT_PERIOD)?;
    let long = median_sma(candles, LONG_PERIOD)?;

    if long <= Decimal::ZERO {
        return Ok(false);
    }

    Ok((short - long) / long > MIN_LEAD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Interval;
    use chrono::Utc;

    fn flat_candles(medians: &[Decimal]) -> Vec<Candle> {
        medians
            .iter()
            .map(|m| Candle {
                symbol: "SOLUSDT".into(),
                interval: Interval::Hour,
                open_time: Utc::now(),
                high: *m + dec!(1),
                low: *m - dec!(1),
                close: *m,
            })
            .collect()
    }

    fn step(first: Decimal, second: Decimal) -> Vec<Candle> {
        let mut medians = vec![first; 5];
        medians.extend(vec![second; 5]);
        flat_candles(&medians)
    }

    #[test]
    fn test_averages_over_trailing_windows() {
        let candles = step(dec!(100), dec!(103));
        assert_eq!(median_sma(&candles, 5).unwrap(), dec!(103));
        assert_eq!(median_sma(&candles, 10).unwrap(), dec!(101.5));
    }

    #[test]
    fn test_lead_above_one_percent_is_superior() {
        // (103 - 101.5) / 101.5 ~= 1.48%
        assert!(is_superior_trend(&step(dec!(100), dec!(103))).unwrap());
    }

    #[test]
    fn test_half_percent_gap_is_not_superior() {
        // avg5 = 101, avg10 = 100.5, lead ~= 0.5%
        assert!(!is_superior_trend(&step(dec!(100), dec!(101))).unwrap());
    }

    #[test]
    fn test_uses_latest_ten_of_longer_history() {
        let mut medians = vec![dec!(1); 20];
        medians.extend(vec![dec!(100); 5]);
        medians.extend(vec![dec!(103); 5]);
        assert!(is_superior_trend(&flat_candles(&medians)).unwrap());
    }

    #[test]
    fn test_fewer_than_ten_candles_is_insufficient() {
        let candles = flat_candles(&[dec!(100); 9]);
        assert_eq!(
            is_superior_trend(&candles),
            Err(TradeError::InsufficientData {
                required: 10,
                available: 9
            })
        );
    }
}

//! Kline window analysis: is a symbol still renewing its highs?
//!
//! The window is scanned oldest to newest while tracking the running maximum
//! of `high`. A candle that fails to exceed the running maximum is a
//! non-renewal. One early non-renewal is tolerated; a second one, or any
//! non-renewal inside the last two candles, disqualifies the window.

use crate::error::{TradeError, TradeResult};
use crate::exchange::Candle;

/// Why a window failed to qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Two non-renewals anywhere in the window
    RepeatedPullback,
    /// A non-renewal within the last two candles
    LatePullback,
    /// Short average does not lead the long average by the required margin
    WeakTrend,
}

/// Result of analyzing one candle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendVerdict {
    /// Highs kept renewing with at most one early pullback
    Renewing { pullbacks: u8 },
    Rejected(RejectReason),
}

impl TrendVerdict {
    pub fn is_opportunity(&self) -> bool {
        matches!(self, TrendVerdict::Renewing { .. })
    }
}

/// Analyze the trailing `period` candles of `candles`.
///
/// Fails with `InsufficientData` when fewer than `period` candles are given.
pub fn analyze_window(candles: &[Candle], period: usize) -> TradeResult<TrendVerdict> {
    if period == 0 || candles.len() < period {
        return Err(TradeError::InsufficientData {
            required: period.max(1),
            available: candles.len(),
        });
    }

    let window = &candles[candles.len() - period..];
    let late_start = period.saturating_sub(2);

    let mut running_max = window[0].high;
    let mut flagged = false;

    for (i, candle) in window.iter().enumerate().skip(1) {
        if candle.high > running_max {
            running_max = candle.high;
            continue;
        }

        if flagged {
            return Ok(TrendVerdict::Rejected(RejectReason::RepeatedPullback));
        }
        if i >= late_start {
            return Ok(TrendVerdict::Rejected(RejectReason::LatePullback));
        }
        flagged = true;
    }

    Ok(TrendVerdict::Renewing {
        pullbacks: u8::from(flagged),
    })
}

/// Boolean form of [`analyze_window`].
pub fn is_opportunity(candles: &[Candle], period: usize) -> TradeResult<bool> {
    analyze_window(candles, period).map(|v| v.is_opportunity())
}

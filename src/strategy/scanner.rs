//! Opportunity scanner across the day, hour and minute horizons.

use super::analyzer::{analyze_window, RejectReason, TrendVerdict};
use super::moving_average::{is_superior_trend, LONG_PERIOD};
use crate::config::StrategyConfig;
use crate::error::{TradeError, TradeResult};
use crate::exchange::{Candle, Horizon, MarketDataSource, Tick};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace};

/// Scannable symbols: quoted in `quote_asset` and not currently held.
pub fn select_universe(tickers: &[Tick], quote_asset: &str, held: &HashSet<String>) -> Vec<Tick> {
    tickers
        .iter()
        .filter(|t| t.symbol.ends_with(quote_asset) && t.symbol.len() > quote_asset.len())
        .filter(|t| !held.contains(&t.symbol))
        .cloned()
        .collect()
}

/// Per-symbol scan outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Qualified,
    NotQualifying(RejectReason),
    InsufficientData,
    NetworkFailure,
}

/// Disjoint per-horizon opportunity lists produced by one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityBuckets {
    pub day: Vec<Tick>,
    pub hour: Vec<Tick>,
    pub minute: Vec<Tick>,
}

impl OpportunityBuckets {
    pub fn get(&self, horizon: Horizon) -> &[Tick] {
        match horizon {
            Horizon::Day => &self.day,
            Horizon::Hour => &self.hour,
            Horizon::Minute => &self.minute,
        }
    }

    fn get_mut(&mut self, horizon: Horizon) -> &mut Vec<Tick> {
        match horizon {
            Horizon::Day => &mut self.day,
            Horizon::Hour => &mut self.hour,
            Horizon::Minute => &mut self.minute,
        }
    }

    /// All opportunities in priority order: day, then hour, then minute.
    pub fn iter(&self) -> impl Iterator<Item = (Horizon, &Tick)> {
        Horizon::ALL
            .into_iter()
            .flat_map(move |h| self.get(h).iter().map(move |t| (h, t)))
    }

    pub fn len(&self) -> usize {
        self.day.len() + self.hour.len() + self.minute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to every bucket independently.
    pub fn map_buckets<F>(self, mut f: F) -> Self
    where
        F: FnMut(Horizon, Vec<Tick>) -> Vec<Tick>,
    {
        Self {
            day: f(Horizon::Day, self.day),
            hour: f(Horizon::Hour, self.hour),
            minute: f(Horizon::Minute, self.minute),
        }
    }
}

/// Rejection tallies for one scan, logged as a summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub evaluated: usize,
    pub qualified: usize,
    pub rejected_repeated_pullback: usize,
    pub rejected_late_pullback: usize,
    pub rejected_weak_trend: usize,
    pub insufficient_data: usize,
    pub network_failures: usize,
}

impl ScanReport {
    fn record(&mut self, outcome: ScanOutcome) {
        self.evaluated += 1;
        match outcome {
            ScanOutcome::Qualified => self.qualified += 1,
            ScanOutcome::NotQualifying(RejectReason::RepeatedPullback) => {
                self.rejected_repeated_pullback += 1
            }
            ScanOutcome::NotQualifying(RejectReason::LatePullback) => {
                self.rejected_late_pullback += 1
            }
            ScanOutcome::NotQualifying(RejectReason::WeakTrend) => self.rejected_weak_trend += 1,
            ScanOutcome::InsufficientData => self.insufficient_data += 1,
            ScanOutcome::NetworkFailure => self.network_failures += 1,
        }
    }
}

/// Scans the market universe for symbols renewing their highs.
pub struct OpportunityScanner {
    days_to_analyze: usize,
    moving_average_filter: bool,
    fetch_concurrency: usize,
}

impl OpportunityScanner {
    /// Create a new scanner with the given configuration.
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            days_to_analyze: config.days_to_analyze,
            moving_average_filter: config.moving_average_filter,
            fetch_concurrency: config.fetch_concurrency.max(1),
        }
    }

    /// Candles in the analysis window for a horizon.
    pub fn period(&self, horizon: Horizon) -> usize {
        horizon.period(self.days_to_analyze)
    }

    /// Candles requested per symbol for a horizon.
    pub fn fetch_count(&self, horizon: Horizon) -> usize {
        let period = self.period(horizon);
        if self.moving_average_filter {
            period.max(LONG_PERIOD)
        } else {
            period
        }
    }

    /// Scan `universe` at each enabled horizon.
    ///
    /// Horizons run in priority order regardless of the order given, and a
    /// symbol claimed by one horizon is not evaluated by later ones.
    #[instrument(skip_all, fields(universe = universe.len()))]
    pub async fn scan(
        &self,
        source: &dyn MarketDataSource,
        universe: &[Tick],
        horizons: &[Horizon],
    ) -> (OpportunityBuckets, ScanReport) {
        let mut enabled: Vec<Horizon> = horizons.to_vec();
        enabled.sort();
        enabled.dedup();

        let mut buckets = OpportunityBuckets::default();
        let mut report = ScanReport::default();
        let mut claimed: HashSet<String> = HashSet::new();

        for horizon in enabled {
            let candidates: Vec<&Tick> = universe
                .iter()
                .filter(|t| !claimed.contains(&t.symbol))
                .collect();

            let outcomes = self.evaluate_all(source, &candidates, horizon).await;

            // Merge in input order so claiming stays deterministic.
            for (tick, outcome) in candidates.into_iter().zip(outcomes) {
                if outcome != ScanOutcome::Qualified {
                    report.record(outcome);
                    continue;
                }
                if !claimed.insert(tick.symbol.clone()) {
                    continue;
                }
                report.record(outcome);
                debug!(symbol = %tick.symbol, %horizon, "Opportunity qualified");
                buckets.get_mut(horizon).push(tick.clone());
            }
        }

        info!(
            evaluated = report.evaluated,
            qualified = report.qualified,
            day = buckets.day.len(),
            hour = buckets.hour.len(),
            minute = buckets.minute.len(),
            rejected_repeated_pullback = report.rejected_repeated_pullback,
            rejected_late_pullback = report.rejected_late_pullback,
            rejected_weak_trend = report.rejected_weak_trend,
            insufficient_data = report.insufficient_data,
            network_failures = report.network_failures,
            "Opportunity scan complete"
        );

        (buckets, report)
    }

    /// Fetch and classify every candidate; results are in candidate order.
    async fn evaluate_all(
        &self,
        source: &dyn MarketDataSource,
        candidates: &[&Tick],
        horizon: Horizon,
    ) -> Vec<ScanOutcome> {
        let interval = horizon.interval();
        let count = self.fetch_count(horizon);

        stream::iter(candidates.iter().copied())
            .map(|tick| async move {
                let fetched = source.fetch_candles(&tick.symbol, interval, count).await;
                let outcome = self.classify(fetched, horizon);
                trace!(symbol = %tick.symbol, %horizon, ?outcome, "Symbol evaluated");
                outcome
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await
    }

    /// Classify a fetched candle history for `horizon`.
    pub fn classify(&self, fetched: TradeResult<Vec<Candle>>, horizon: Horizon) -> ScanOutcome {
        let candles = match fetched {
            Ok(candles) => candles,
            Err(TradeError::InsufficientData { .. }) => return ScanOutcome::InsufficientData,
            Err(_) => return ScanOutcome::NetworkFailure,
        };

        match analyze_window(&candles, self.period(horizon)) {
            Ok(TrendVerdict::Renewing { .. }) => {}
            Ok(TrendVerdict::Rejected(reason)) => return ScanOutcome::NotQualifying(reason),
            Err(_) => return ScanOutcome::InsufficientData,
        }

        if !self.moving_average_filter {
            return ScanOutcome::Qualified;
        }

        match is_superior_trend(&candles) {
            Ok(true) => ScanOutcome::Qualified,
            Ok(false) => ScanOutcome::NotQualifying(RejectReason::WeakTrend),
            Err(_) => ScanOutcome::InsufficientData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Interval, MockExchange};
    use crate::strategy::analyzer::tests::candles_with_highs;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn config(ma_filter: bool) -> StrategyConfig {
        StrategyConfig {
            days_to_analyze: 3,
            horizons: Horizon::ALL.to_vec(),
            moving_average_filter: ma_filter,
            quote_asset: "USDT".into(),
            fetch_concurrency: 4,
        }
    }

    fn tick(symbol: &str) -> Tick {
        Tick::new(symbol, dec!(100), dec!(99.9))
    }

    fn rising(n: usize) -> Vec<Candle> {
        let highs: Vec<Decimal> = (1..=n).map(|i| Decimal::from(i as u64 * 10)).collect();
        candles_with_highs(&highs)
    }

    fn falling(n: usize) -> Vec<Candle> {
        let highs: Vec<Decimal> = (1..=n).rev().map(|i| Decimal::from(i as u64 * 10)).collect();
        candles_with_highs(&highs)
    }

    #[test]
    fn test_fetch_counts() {
        let plain = OpportunityScanner::new(&config(false));
        assert_eq!(plain.fetch_count(Horizon::Day), 4);
        assert_eq!(plain.fetch_count(Horizon::Hour), 3);
        assert_eq!(plain.fetch_count(Horizon::Minute), 3);

        let filtered = OpportunityScanner::new(&config(true));
        assert_eq!(filtered.fetch_count(Horizon::Day), 10);
        assert_eq!(filtered.fetch_count(Horizon::Minute), 10);
        assert_eq!(filtered.period(Horizon::Minute), 3);
    }

    #[tokio::test]
    async fn test_symbol_claimed_by_first_horizon_only() {
        let mock = MockExchange::new();
        for interval in [Interval::Day, Interval::Hour, Interval::Minute] {
            mock.set_candles("BTCUSDT", interval, rising(4));
        }
        mock.set_candles("ETHUSDT", Interval::Day, falling(4));
        mock.set_candles("ETHUSDT", Interval::Hour, rising(3));
        mock.set_candles("ETHUSDT", Interval::Minute, rising(3));
        mock.set_candles("SOLUSDT", Interval::Day, falling(4));
        mock.set_candles("SOLUSDT", Interval::Hour, falling(3));
        mock.set_candles("SOLUSDT", Interval::Minute, rising(3));

        let scanner = OpportunityScanner::new(&config(false));
        let universe = vec![tick("BTCUSDT"), tick("ETHUSDT"), tick("SOLUSDT")];
        let (buckets, report) = scanner.scan(&mock, &universe, &Horizon::ALL).await;

        assert_eq!(buckets.day, vec![tick("BTCUSDT")]);
        assert_eq!(buckets.hour, vec![tick("ETHUSDT")]);
        assert_eq!(buckets.minute, vec![tick("SOLUSDT")]);
        assert_eq!(report.qualified, 3);

        // Claimed symbols are not fetched at lower horizons.
        let requests = mock.candle_requests();
        assert!(!requests
            .iter()
            .any(|(s, i, _)| s == "BTCUSDT" && *i != Interval::Day));
    }

    #[tokio::test]
    async fn test_horizon_order_argument_does_not_change_priority() {
        let mock = MockExchange::new();
        for interval in [Interval::Day, Interval::Hour, Interval::Minute] {
            mock.set_candles("BTCUSDT", interval, rising(4));
        }
        let scanner = OpportunityScanner::new(&config(false));
        let universe = vec![tick("BTCUSDT")];

        let (buckets, _) = scanner
            .scan(&mock, &universe, &[Horizon::Minute, Horizon::Hour, Horizon::Day])
            .await;
        assert_eq!(buckets.day.len(), 1);
        assert!(buckets.hour.is_empty());
        assert!(buckets.minute.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_universe_entries_never_repeat() {
        let mock = MockExchange::new();
        mock.set_candles("BTCUSDT", Interval::Hour, rising(3));
        mock.set_candles("BTCUSDT", Interval::Minute, rising(3));
        let scanner = OpportunityScanner::new(&config(false));
        let universe = vec![tick("BTCUSDT"), tick("BTCUSDT")];

        let (buckets, _) = scanner.scan(&mock, &universe, &Horizon::ALL).await;
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets.hour.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_skips_symbol_only() {
        let mock = MockExchange::new();
        mock.set_candles("BTCUSDT", Interval::Hour, rising(3));
        mock.set_candles("ETHUSDT", Interval::Hour, rising(3));
        mock.fail_symbol("BTCUSDT");

        let scanner = OpportunityScanner::new(&config(false));
        let universe = vec![tick("BTCUSDT"), tick("ETHUSDT")];
        let (buckets, report) = scanner.scan(&mock, &universe, &[Horizon::Hour]).await;

        assert_eq!(buckets.hour, vec![tick("ETHUSDT")]);
        assert_eq!(report.network_failures, 1);
    }

    #[tokio::test]
    async fn test_short_history_counts_as_insufficient_data() {
        let mock = MockExchange::new();
        mock.set_candles("NEWUSDT", Interval::Day, rising(2));
        let scanner = OpportunityScanner::new(&config(false));

        let (buckets, report) = scanner
            .scan(&mock, &[tick("NEWUSDT")], &[Horizon::Day])
            .await;
        assert!(buckets.is_empty());
        assert_eq!(report.insufficient_data, 1);
    }

    #[tokio::test]
    async fn test_bucket_preserves_universe_order() {
        let mock = MockExchange::new();
        let symbols = ["AUSDT", "BUSDT", "CUSDT", "DUSDT", "EUSDT", "FUSDT"];
        for s in symbols {
            mock.set_candles(s, Interval::Minute, rising(3));
        }
        let scanner = OpportunityScanner::new(&config(false));
        let universe: Vec<Tick> = symbols.iter().map(|s| tick(s)).collect();

        let (buckets, _) = scanner.scan(&mock, &universe, &[Horizon::Minute]).await;
        let got: Vec<&str> = buckets.minute.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(got, symbols.to_vec());
    }

    #[test]
    fn test_classify_applies_moving_average_filter() {
        let scanner = OpportunityScanner::new(&config(true));

        // Trailing three highs rise, but averages are flat.
        let mut highs = vec![dec!(100); 7];
        highs.extend([dec!(100.1), dec!(100.2), dec!(100.3)]);
        let flat = candles_with_highs(&highs);
        assert_eq!(
            scanner.classify(Ok(flat), Horizon::Hour),
            ScanOutcome::NotQualifying(RejectReason::WeakTrend)
        );

        assert_eq!(
            scanner.classify(Ok(rising(10)), Horizon::Hour),
            ScanOutcome::Qualified
        );
        assert_eq!(
            scanner.classify(Ok(rising(4)), Horizon::Hour),
            ScanOutcome::InsufficientData
        );
        assert_eq!(
            scanner.classify(Err(TradeError::Network("down".into())), Horizon::Hour),
            ScanOutcome::NetworkFailure
        );
    }

    #[test]
    fn test_universe_filters_quote_asset_and_held() {
        let tickers = vec![tick("BTCUSDT"), tick("ETHBTC"), tick("SOLUSDT"), tick("USDT")];
        let held: HashSet<String> = ["SOLUSDT".to_string()].into_iter().collect();
        let universe = select_universe(&tickers, "USDT", &held);
        assert_eq!(universe, vec![tick("BTCUSDT")]);
    }

    #[test]
    fn test_buckets_iterate_in_priority_order() {
        let buckets = OpportunityBuckets {
            day: vec![tick("A")],
            hour: vec![tick("B")],
            minute: vec![tick("C")],
        };
        let order: Vec<(Horizon, &str)> = buckets
            .iter()
            .map(|(h, t)| (h, t.symbol.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![(Horizon::Day, "A"), (Horizon::Hour, "B"), (Horizon::Minute, "C")]
        );
    }
}

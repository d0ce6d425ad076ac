//! The decision loop.
//!
//! Each cycle runs to completion before the next begins:
//! refresh tickers, scan, filter repurchases, buy, reconcile, persist.
//! Shutdown is only observed between cycles.

use crate::config::Config;
use crate::error::{TradeError, TradeResult};
use crate::events::{EventPublisher, EventRecord};
use crate::exchange::{Horizon, MarketDataSource, OrderGateway, OrderRequest, OrderSide, Tick};
use crate::persistence::{PositionStore, TradeJournal};
use crate::risk::{ClosedPosition, PortfolioReconciler, Position};
use crate::strategy::{select_universe, OpportunityScanner, RepurchaseGuard, ScanReport};
use crate::utils::round_down_to_dp;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// State owned by the control loop, replaced from component results.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub positions: Vec<Position>,
    pub recent_exits: Vec<ClosedPosition>,
    /// Last ticks of symbols exited in the latest cycle, kept for reporting.
    /// Exited symbols rejoin the scan because `select_universe` only drops
    /// held symbols.
    pub resumed: Vec<Tick>,
    /// Positions changed since the last successful save
    pub dirty: bool,
}

/// Summary of one decision cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub universe: usize,
    pub scan: ScanReport,
    pub opportunities: usize,
    pub blocked_repurchases: usize,
    pub buys: usize,
    pub failed_buys: usize,
    pub exits: usize,
    pub failed_sells: usize,
    pub open_positions: usize,
    pub saved: bool,
    pub duration_ms: u128,
}

/// Collaborators handed to the engine at construction.
pub struct Collaborators {
    pub source: Arc<dyn MarketDataSource>,
    pub gateway: Arc<dyn OrderGateway>,
    pub publisher: Arc<dyn EventPublisher>,
    pub store: Box<dyn PositionStore>,
    pub journal: TradeJournal,
}

pub struct TradingEngine {
    config: Config,
    source: Arc<dyn MarketDataSource>,
    gateway: Arc<dyn OrderGateway>,
    publisher: Arc<dyn EventPublisher>,
    store: Box<dyn PositionStore>,
    journal: TradeJournal,
    scanner: OpportunityScanner,
    guard: RepurchaseGuard,
    reconciler: PortfolioReconciler,
    state: EngineState,
}

impl TradingEngine {
    /// Build the engine and restore persisted state.
    ///
    /// Fails if open positions or recent exits cannot be loaded.
    pub fn new(config: Config, collaborators: Collaborators) -> TradeResult<Self> {
        let Collaborators {
            source,
            gateway,
            publisher,
            store,
            journal,
        } = collaborators;

        let positions = store.load()?;
        let since = Utc::now() - ChronoDuration::hours(i64::from(config.risk.exit_memory_hours));
        let recent_exits = journal.recent_exits(since)?;

        info!(
            positions = positions.len(),
            recent_exits = recent_exits.len(),
            "📂 [PERSISTENCE] Engine state restored"
        );

        Ok(Self {
            scanner: OpportunityScanner::new(&config.strategy),
            guard: RepurchaseGuard::new(config.risk.repurchase_recovery_pct),
            reconciler: PortfolioReconciler::default(),
            state: EngineState {
                positions,
                recent_exits,
                resumed: Vec::new(),
                dirty: false,
            },
            config,
            source,
            gateway,
            publisher,
            store,
            journal,
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn journal(&self) -> &TradeJournal {
        &self.journal
    }

    /// Run one decision cycle.
    ///
    /// Fails only when the ticker snapshot cannot be fetched; the open
    /// positions are then left untouched.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> TradeResult<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let tickers = self.source.fetch_tickers().await?;
        self.prune_recent_exits();

        // PHASE 1: scan
        let held: HashSet<String> = self
            .state
            .positions
            .iter()
            .map(|p| p.symbol.clone())
            .collect();
        let universe = select_universe(&tickers, &self.config.strategy.quote_asset, &held);
        report.universe = universe.len();
        info!("📡 [SCAN] Scanning {} symbols", universe.len());

        let (buckets, scan) = self
            .scanner
            .scan(
                self.source.as_ref(),
                &universe,
                &self.config.strategy.horizons,
            )
            .await;
        report.scan = scan;

        // PHASE 2: repurchase guard
        let found = buckets.len();
        let guard = &self.guard;
        let exits = &self.state.recent_exits;
        let candidates = buckets.map_buckets(|_, bucket| guard.filter(bucket, exits));
        report.opportunities = candidates.len();
        report.blocked_repurchases = found - candidates.len();

        // PHASE 3: entries
        let mut positions = std::mem::take(&mut self.state.positions);
        let before = positions.clone();
        for (horizon, tick) in candidates.iter() {
            if positions.len() >= self.config.execution.max_open_positions {
                debug!("Position limit reached, skipping remaining opportunities");
                break;
            }
            match self.open_position(horizon, tick).await {
                Ok(Some(position)) => {
                    positions.push(position);
                    report.buys += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(symbol = %tick.symbol, error = %e, "❌ [ENTRY] Buy failed, skipping");
                    report.failed_buys += 1;
                }
            }
        }

        // PHASE 4: reconcile
        let outcome = self
            .reconciler
            .reconcile(positions, self.source.as_ref(), self.gateway.as_ref())
            .await;
        report.exits = outcome.exits.len();
        report.failed_sells = outcome.failed_sells;

        for closed in &outcome.exits {
            self.record_exit(closed).await;
        }
        self.state.recent_exits.extend(outcome.exits);
        self.state.resumed = outcome.resume_monitoring;
        self.state.positions = outcome.open;
        report.open_positions = self.state.positions.len();

        // PHASE 5: persist
        if self.state.positions != before {
            self.state.dirty = true;
        }
        if self.state.dirty {
            report.saved = self.save();
        }

        report.duration_ms = started.elapsed().as_millis();
        info!(
            universe = report.universe,
            opportunities = report.opportunities,
            blocked = report.blocked_repurchases,
            buys = report.buys,
            exits = report.exits,
            open = report.open_positions,
            duration_ms = report.duration_ms as u64,
            "⏱️  Cycle complete"
        );

        Ok(report)
    }

    /// Loop cycles until `shutdown` turns true or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.execution.tick_interval_secs);

        info!("🚀 Starting decision loop");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "⚠️ Cycle failed, retrying next tick");
                }
                Err(e) => error!(error = %e, "❌ Cycle failed"),
                Ok(_) => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("💾 [PERSISTENCE] Saving final state before shutdown...");
        if self.save() {
            info!("✅ [PERSISTENCE] Final state saved");
        }
    }

    /// Buy `tick` for `horizon`. `Ok(None)` when the order size rounds to zero.
    async fn open_position(&self, horizon: Horizon, tick: &Tick) -> TradeResult<Option<Position>> {
        let execution = &self.config.execution;
        if tick.ask_price <= Decimal::ZERO {
            return Ok(None);
        }

        let quantity = round_down_to_dp(
            execution.order_value / tick.ask_price,
            execution.quantity_precision,
        );
        if quantity <= Decimal::ZERO {
            debug!(symbol = %tick.symbol, ask = %tick.ask_price, "Order size rounds to zero");
            return Ok(None);
        }

        let request = OrderRequest {
            symbol: tick.symbol.clone(),
            side: OrderSide::Buy,
            quantity,
            reference_price: tick.ask_price,
        };
        let fill = self.gateway.place_order(&request).await?;
        if fill.executed_qty <= Decimal::ZERO {
            return Err(TradeError::Order(format!("{} buy filled nothing", tick.symbol)));
        }

        let position = Position::open(
            tick.symbol.clone(),
            horizon,
            fill.avg_price,
            fill.executed_qty,
            self.config.risk.threshold_for(horizon),
            Utc::now(),
        )?;

        info!(
            symbol = %position.symbol,
            %horizon,
            price = %position.entry_price,
            quantity = %position.quantity,
            value = %position.entry_value,
            order_id = fill.order_id,
            "🟢 [ENTRY] Position opened"
        );

        if let Err(e) = self.journal.record_entry(&position) {
            warn!(symbol = %position.symbol, error = %e, "Failed to journal entry");
        }
        self.publish(EventRecord::buy(&position)).await;

        Ok(Some(position))
    }

    async fn record_exit(&self, closed: &ClosedPosition) {
        if let Err(e) = self.journal.record_exit(closed) {
            warn!(symbol = %closed.symbol, error = %e, "Failed to journal exit");
        }
        self.publish(EventRecord::sell(closed)).await;
    }

    async fn publish(&self, event: EventRecord) {
        if !self.publisher.publish(&event).await {
            warn!(symbol = %event.symbol, kind = ?event.kind, "Event delivery not confirmed");
        }
    }

    fn prune_recent_exits(&mut self) {
        let cutoff =
            Utc::now() - ChronoDuration::hours(i64::from(self.config.risk.exit_memory_hours));
        self.state.recent_exits.retain(|c| c.closed_at >= cutoff);
    }

    /// Save open positions; a failure leaves the state dirty for the next attempt.
    fn save(&mut self) -> bool {
        match self.store.save(&self.state.positions) {
            Ok(()) => {
                self.state.dirty = false;
                true
            }
            Err(e) => {
                error!(error = %e, "❌ [PERSISTENCE] Failed to save positions, will retry");
                self.state.dirty = true;
                false
            }
        }
    }
}

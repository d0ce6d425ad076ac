//! SQLite trade journal.
//!
//! Records every filled buy and sell so that:
//! - recent exits survive restarts for the repurchase guard
//! - `status` can report trade history and realized performance

use crate::error::TradeResult;
use crate::exchange::{Horizon, OrderSide};
use crate::risk::{ClosedPosition, ExitReason, Position};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// One journaled trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub horizon: Horizon,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Realized percent change (sells only)
    pub valorization: Option<Decimal>,
    pub reason: Option<ExitReason>,
}

/// Aggregate performance over all journaled trades.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalSummary {
    pub entries: u64,
    pub exits: u64,
    pub wins: u64,
    pub losses: u64,
    /// Sum of realized percent changes
    pub total_valorization: Decimal,
    /// Sum of realized profit in quote currency
    pub realized_pnl: Decimal,
}

pub struct TradeJournal {
    conn: Connection,
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

impl TradeJournal {
    /// Open (or create) the journal at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> TradeResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        let journal = Self { conn };
        journal.init_schema()?;

        info!("Trade journal initialized at {:?}", db_path.as_ref());
        Ok(journal)
    }

    /// In-memory journal for tests and dry runs.
    pub fn in_memory() -> TradeResult<Self> {
        let journal = Self {
            conn: Connection::open_in_memory()?,
        };
        journal.init_schema()?;
        Ok(journal)
    }

    fn init_schema(&self) -> TradeResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                horizon TEXT NOT NULL,
                quantity TEXT NOT NULL,
                price TEXT NOT NULL,
                entry_price TEXT,
                valorization TEXT,
                reason TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp);
            CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);
            "#,
        )?;

        debug!("Journal schema initialized");
        Ok(())
    }

    /// Record a filled buy.
    pub fn record_entry(&self, position: &Position) -> TradeResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO trades (timestamp, symbol, side, horizon, quantity, price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                timestamp(&position.opened_at),
                position.symbol,
                OrderSide::Buy.to_string(),
                position.horizon.to_string(),
                position.quantity.to_string(),
                position.entry_price.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Record a filled sell.
    pub fn record_exit(&self, closed: &ClosedPosition) -> TradeResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO trades (timestamp, symbol, side, horizon, quantity, price,
                                entry_price, valorization, reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                timestamp(&closed.closed_at),
                closed.symbol,
                OrderSide::Sell.to_string(),
                closed.horizon.to_string(),
                closed.quantity.to_string(),
                closed.exit_price.to_string(),
                closed.entry_price.to_string(),
                closed.valorization.to_string(),
                closed.reason.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Exits closed at or after `since`, oldest first.
    pub fn recent_exits(&self, since: DateTime<Utc>) -> TradeResult<Vec<ClosedPosition>> {
        self.exits_from(&timestamp(&since))
    }

    fn exits_from(&self, bound: &str) -> TradeResult<Vec<ClosedPosition>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, symbol, horizon, quantity, price, entry_price, valorization, reason
            FROM trades
            WHERE side = 'SELL' AND timestamp >= ?1
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map([bound], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut exits = Vec::new();
        for row in rows {
            let (ts, symbol, horizon, quantity, price, entry, valorization, reason) = row?;
            let (Some(closed_at), Ok(horizon), Some(Ok(reason))) = (
                parse_timestamp(&ts),
                horizon.parse::<Horizon>(),
                reason.as_deref().map(ExitReason::from_str),
            ) else {
                warn!(%symbol, "Skipping malformed journal exit");
                continue;
            };

            exits.push(ClosedPosition {
                symbol,
                horizon,
                entry_price: entry.as_deref().map(parse_decimal).unwrap_or_default(),
                exit_price: parse_decimal(&price),
                quantity: parse_decimal(&quantity),
                valorization: valorization.as_deref().map(parse_decimal).unwrap_or_default(),
                reason,
                closed_at,
            });
        }

        Ok(exits)
    }

    /// Most recent trades, newest first.
    pub fn recent_trades(&self, limit: usize) -> TradeResult<Vec<TradeRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, symbol, side, horizon, quantity, price, valorization, reason
            FROM trades
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut trades = Vec::new();
        for row in rows {
            let (ts, symbol, side, horizon, quantity, price, valorization, reason) = row?;
            let side = match side.as_str() {
                "BUY" => Some(OrderSide::Buy),
                "SELL" => Some(OrderSide::Sell),
                _ => None,
            };
            let (Some(timestamp), Some(side), Ok(horizon)) =
                (parse_timestamp(&ts), side, horizon.parse::<Horizon>())
            else {
                warn!(%symbol, "Skipping malformed journal trade");
                continue;
            };

            trades.push(TradeRecord {
                timestamp,
                symbol,
                side,
                horizon,
                quantity: parse_decimal(&quantity),
                price: parse_decimal(&price),
                valorization: valorization.as_deref().map(parse_decimal),
                reason: reason.and_then(|r| r.parse().ok()),
            });
        }

        Ok(trades)
    }

    /// Aggregate counts and realized performance.
    pub fn summary(&self) -> TradeResult<JournalSummary> {
        let entries: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM trades WHERE side = 'BUY'",
            [],
            |row| row.get(0),
        )?;

        let mut summary = JournalSummary {
            entries: entries as u64,
            ..Default::default()
        };

        for exit in self.exits_from("")? {
            summary.exits += 1;
            if exit.valorization > Decimal::ZERO {
                summary.wins += 1;
            } else {
                summary.losses += 1;
            }
            summary.total_valorization += exit.valorization;
            summary.realized_pnl += exit.pnl();
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn closed(symbol: &str, entry: Decimal, exit: Decimal, at: DateTime<Utc>) -> ClosedPosition {
        let position = Position::open(symbol, Horizon::Hour, entry, dec!(2), dec!(-2), at).unwrap();
        position.close(exit, ExitReason::TotalLoss, at)
    }

    #[test]
    fn test_recent_exits_filters_by_time() {
        let journal = TradeJournal::in_memory().unwrap();
        let now = Utc::now();

        journal
            .record_exit(&closed("OLDUSDT", dec!(100), dec!(95), now - Duration::hours(30)))
            .unwrap();
        let recent = closed("NEWUSDT", dec!(100), dec!(97), now - Duration::hours(1));
        journal.record_exit(&recent).unwrap();

        let exits = journal.recent_exits(now - Duration::hours(24)).unwrap();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].symbol, "NEWUSDT");
        assert_eq!(exits[0].exit_price, dec!(97));
        assert_eq!(exits[0].valorization, dec!(-3));
        assert_eq!(exits[0].reason, ExitReason::TotalLoss);
        assert_eq!(exits[0].horizon, Horizon::Hour);
    }

    #[test]
    fn test_recent_trades_newest_first() {
        let journal = TradeJournal::in_memory().unwrap();
        let now = Utc::now();
        let position =
            Position::open("BTCUSDT", Horizon::Day, dec!(100), dec!(1), dec!(-3), now).unwrap();
        journal.record_entry(&position).unwrap();
        journal
            .record_exit(&position.close(dec!(103), ExitReason::SharpDrop, now))
            .unwrap();

        let trades = journal.recent_trades(10).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, OrderSide::Sell);
        assert_eq!(trades[0].reason, Some(ExitReason::SharpDrop));
        assert_eq!(trades[1].side, OrderSide::Buy);
        assert_eq!(trades[1].valorization, None);

        assert_eq!(journal.recent_trades(1).unwrap().len(), 1);
    }

    #[test]
    fn test_summary_counts_wins_and_losses() {
        let journal = TradeJournal::in_memory().unwrap();
        let now = Utc::now();
        journal
            .record_exit(&closed("AUSDT", dec!(100), dec!(104), now))
            .unwrap();
        journal
            .record_exit(&closed("BUSDT", dec!(100), dec!(98), now))
            .unwrap();

        let summary = journal.summary().unwrap();
        assert_eq!(summary.exits, 2);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.total_valorization, dec!(2));
        assert_eq!(summary.realized_pnl, dec!(4));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let journal = TradeJournal::in_memory().unwrap();
        let now = Utc::now();
        journal
            .record_exit(&closed("GOODUSDT", dec!(100), dec!(97), now - Duration::hours(2)))
            .unwrap();
        journal
            .conn
            .execute(
                r#"
                INSERT INTO trades (timestamp, symbol, side, horizon, quantity, price,
                                    entry_price, valorization, reason)
                VALUES ('not-a-time', 'BADUSDT', 'SELL', 'hour', '1', '90', '100', '-10', 'total_loss'),
                       ('2026-01-01T00:00:00.000000Z', 'ODDUSDT', 'SELL', 'week', '1', '90', '100', '-10', 'total_loss')
                "#,
                [],
            )
            .unwrap();

        let exits = journal.recent_exits(now - Duration::hours(24)).unwrap();
        let symbols: Vec<&str> = exits.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["GOODUSDT"]);

        let trades = journal.recent_trades(10).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].symbol, "GOODUSDT");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/journal.db");
        let journal = TradeJournal::open(&path).unwrap();
        assert_eq!(journal.summary().unwrap(), JournalSummary::default());
        assert!(path.exists());
    }
}

//! Trade event records and their publishers.

mod webhook;

pub use webhook::WebhookPublisher;

use crate::exchange::Horizon;
use crate::risk::{ClosedPosition, ExitReason, Position};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Buy,
    Sell,
}

/// A buy or sell notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub symbol: String,
    pub horizon: Horizon,
    pub price: Decimal,
    pub quantity: Decimal,
    pub value: Decimal,
    pub valorization: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExitReason>,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn buy(position: &Position) -> Self {
        Self {
            kind: EventKind::Buy,
            symbol: position.symbol.clone(),
            horizon: position.horizon,
            price: position.entry_price,
            quantity: position.quantity,
            value: position.entry_value,
            valorization: Decimal::ZERO,
            reason: None,
            timestamp: position.opened_at,
        }
    }

    pub fn sell(closed: &ClosedPosition) -> Self {
        Self {
            kind: EventKind::Sell,
            symbol: closed.symbol.clone(),
            horizon: closed.horizon,
            price: closed.exit_price,
            quantity: closed.quantity,
            value: closed.exit_price * closed.quantity,
            valorization: closed.valorization,
            reason: Some(closed.reason),
            timestamp: closed.closed_at,
        }
    }
}

/// Delivers trade events.
///
/// Returns whether delivery was acknowledged; `false` is never fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &EventRecord) -> bool;
}

/// Publisher that only writes events to the log.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &EventRecord) -> bool {
        info!(
            kind = ?event.kind,
            symbol = %event.symbol,
            horizon = %event.horizon,
            price = %event.price,
            quantity = %event.quantity,
            valorization = %event.valorization.round_dp(4),
            "Trade event"
        );
        true
    }
}

//! Position lifecycle and risk management.
//!
//! - Position and closed-position records
//! - Per-tick stop rules by horizon
//! - Portfolio reconciliation against live quotes

mod monitor;
mod position;
mod reconciler;

pub use monitor::{PositionRiskMonitor, RiskDecision};
pub use position::{ClosedPosition, ExitReason, Position};
pub use reconciler::{PortfolioReconciler, ReconcileOutcome};

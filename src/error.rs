//! Error kinds for the trading engine.
//!
//! Each variant maps to a distinct recovery policy:
//! - `InsufficientData`: local decision failure, the symbol is skipped
//! - `Network`: collaborator fetch failed, per-symbol skip or aborted cycle
//! - `Order`: placement failed, the position is left untouched and retried later
//! - `Persistence`: store failure, fatal at startup and retried otherwise

use thiserror::Error;

/// Main error type for the engine and its collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("Insufficient data: required {required} candles, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Order error: {0}")]
    Order(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TradeError {
    /// Whether a later tick may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradeError::Network(_) | TradeError::Order(_) | TradeError::Persistence(_)
        )
    }
}

impl From<reqwest::Error> for TradeError {
    fn from(err: reqwest::Error) -> Self {
        TradeError::Network(err.to_string())
    }
}

impl From<rusqlite::Error> for TradeError {
    fn from(err: rusqlite::Error) -> Self {
        TradeError::Persistence(err.to_string())
    }
}

impl From<csv::Error> for TradeError {
    fn from(err: csv::Error) -> Self {
        TradeError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for TradeError {
    fn from(err: std::io::Error) -> Self {
        TradeError::Persistence(err.to_string())
    }
}

/// Result type alias for TradeError
pub type TradeResult<T> = std::result::Result<T, TradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_is_structural() {
        let err = TradeError::InsufficientData {
            required: 6,
            available: 2,
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Insufficient data: required 6 candles, got 2"
        );
    }

    #[test]
    fn test_network_and_order_are_retryable() {
        assert!(TradeError::Network("timeout".into()).is_retryable());
        assert!(TradeError::Order("rejected".into()).is_retryable());
    }
}

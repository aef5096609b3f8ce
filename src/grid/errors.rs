//! Grid-specific error types

use thiserror::Error;

use super::types::OrderSide;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error(
        "Invalid grid range: lower={lower}, upper={upper}, grid_count={grid_count} \
         (need finite upper > lower and 1 <= grid_count <= 1000)"
    )]
    InvalidRange {
        lower: f64,
        upper: f64,
        grid_count: u32,
    },

    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("Market data unavailable for {symbol}: {source}")]
    MarketData {
        symbol: String,
        #[source]
        source: crate::Error,
    },

    #[error("Exchange query failed for {symbol}: {source}")]
    ExchangeQuery {
        symbol: String,
        #[source]
        source: crate::Error,
    },

    #[error("Placement of {side:?} at level {level} for {symbol} failed: {reason}")]
    Placement {
        symbol: String,
        level: u32,
        side: OrderSide,
        reason: String,
    },

    #[error("Cancellation of order {order_id} for {symbol} failed: {reason}")]
    Cancellation {
        symbol: String,
        order_id: String,
        reason: String,
    },

    #[error("Consistency anomaly on {symbol}: order {order_id} {detail}")]
    ConsistencyAnomaly {
        symbol: String,
        order_id: String,
        detail: String,
    },

    #[error("Grid level not found: index {0}")]
    LevelNotFound(u32),

    #[error("Level {level} already has a resting order (binding {side:?})")]
    LevelOccupied { level: u32, side: OrderSide },

    #[error("Order {0} is already bound to a level")]
    DuplicateOrder(String),

    #[error("Risk limit exceeded: {0}")]
    RiskLimitExceeded(String),

    #[error("A session for {0} is already running")]
    AlreadyRunning(String),

    #[error("No running session for {0}")]
    NotRunning(String),

    #[error("Unknown session: {0}")]
    SessionNotFound(String),
}

impl GridError {
    /// Errors rejected before a session is constructed
    pub fn is_config(&self) -> bool {
        matches!(self, GridError::InvalidRange { .. } | GridError::InvalidConfig(_))
    }

    /// Errors that abort a tick and are retried on the next schedule
    pub fn is_transient(&self) -> bool {
        matches!(self, GridError::MarketData { .. } | GridError::ExchangeQuery { .. })
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let range = GridError::InvalidRange {
            lower: 110.0,
            upper: 100.0,
            grid_count: 5,
        };
        assert!(range.is_config());
        assert!(!range.is_transient());

        let market = GridError::MarketData {
            symbol: "BTCUSDT".into(),
            source: crate::Error::Http {
                endpoint: "/api/v2/spot/market/tickers".into(),
                status: Some(502),
                message: "bad gateway".into(),
            },
        };
        assert!(market.is_transient());
        assert!(!market.is_config());
    }

    #[test]
    fn test_transport_context_in_message() {
        let err = GridError::ExchangeQuery {
            symbol: "ETHUSDT".into(),
            source: crate::Error::Http {
                endpoint: "/api/v2/spot/trade/unfilled-orders".into(),
                status: Some(429),
                message: "too many requests".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("ETHUSDT"));
        assert!(msg.contains("unfilled-orders"));
        assert!(msg.contains("429"));
    }
}

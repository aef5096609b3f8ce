//! Spot grid trading by periodic reconciliation
//!
//! A grid is a ladder of `grid_count + 1` evenly spaced price levels. Each
//! level is either EMPTY (it may rest a buy at its own price) or LONG (it holds
//! the base bought there and may rest a sell one rung up). Every tick the
//! engine compares the grid with the exchange's open orders, turns vanished
//! orders into fills or releases, and re-arms whatever is missing.
//!
//! # Architecture
//!
//! - [`config`] - Grid configuration, risk limits and symbol precision
//! - [`types`] - Levels, order refs and exchange-facing records
//! - [`errors`] - Grid-specific error types
//! - [`model`] - The level ladder and the order-id index
//! - [`stats`] - Profit, position and fill accounting
//! - [`risk`] - Daily-loss, position and price-gap guards
//! - [`executor`] - Exchange abstraction (mockable for testing)
//! - [`engine`] - The per-tick reconciliation cycle
//! - [`session`] - One loop per symbol, start/stop/status
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use spot_grid_bot::bitget::{ApiCredentials, BitgetClient};
//! use spot_grid_bot::grid::{GridConfig, SessionSupervisor};
//!
//! let client = BitgetClient::new(None, ApiCredentials::new(key, secret, passphrase), None)?;
//! let supervisor = SessionSupervisor::new(Arc::new(client), Duration::from_secs(10));
//!
//! // $1000 over 5 grids between 100 and 110
//! supervisor.start(GridConfig::new("BTCUSDT", 100.0, 110.0, 5, 1000.0)).await?;
//! ```
//!
//! # Testing
//!
//! [`executor::mock::MockExchange`] is a scripted in-memory exchange: orders
//! placed through it rest until a test fills or cancels them.

pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod model;
pub mod risk;
pub mod session;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use config::{AssetPrecision, GridConfig, RiskConfig};
pub use engine::{ReconciliationEngine, TickOutcome, TickReport};
pub use errors::{GridError, GridResult};
pub use executor::GridExchange;
pub use model::Grid;
pub use risk::{PriceGapDetector, RiskBreach, RiskInputs, RiskManager, RiskVerdict};
pub use session::{SessionStatus, SessionSupervisor};
pub use stats::{FillCounts, ProfitTracker, StatsSnapshot};
pub use types::{
    GridLevel, LevelState, OpenOrder, OrderDetail, OrderRef, OrderSide, OrderStatus, RunState,
};

//! Grid trading configuration

use serde::{Deserialize, Serialize};

use crate::consts::MAX_GRID_COUNT;
use crate::helpers::{format_decimal, round_float, tick_size, truncate_float};

use super::errors::{GridError, GridResult};

/// Decimal precision of a spot symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrecision {
    /// Decimal places accepted for prices
    pub price_decimals: u32,
    /// Decimal places accepted for base quantities
    pub quantity_decimals: u32,
}

impl AssetPrecision {
    pub fn new(price_decimals: u32, quantity_decimals: u32) -> Self {
        Self {
            price_decimals,
            quantity_decimals,
        }
    }

    /// Round a price to the nearest tick
    pub fn round_price(&self, price: f64) -> f64 {
        round_float(price, self.price_decimals)
    }

    /// Floor a quantity to the instrument precision (never rounds up)
    pub fn floor_quantity(&self, quantity: f64) -> f64 {
        truncate_float(quantity, self.quantity_decimals, false)
    }

    /// Wire representation of a price
    pub fn format_price(&self, price: f64) -> String {
        format_decimal(price, self.price_decimals)
    }

    /// Wire representation of a quantity
    pub fn format_quantity(&self, quantity: f64) -> String {
        format_decimal(quantity, self.quantity_decimals)
    }

    /// Smallest price increment
    pub fn price_tick(&self) -> f64 {
        tick_size(self.price_decimals)
    }
}

impl Default for AssetPrecision {
    fn default() -> Self {
        Self::new(2, 4)
    }
}

/// Account-level risk guards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// When false every check passes
    #[serde(default)]
    pub enabled: bool,

    /// Maximum realized loss for the UTC day, in percent of account balance
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: f64,

    /// Maximum net base quantity held across the grid
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,

    /// Maximum relative move between consecutive tick prices, in percent.
    /// Zero disables the gap detector.
    #[serde(default = "default_max_price_gap_pct")]
    pub max_price_gap_pct: f64,
}

fn default_max_daily_loss_pct() -> f64 {
    5.0
}

fn default_max_position_size() -> f64 {
    f64::MAX
}

fn default_max_price_gap_pct() -> f64 {
    10.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_position_size: default_max_position_size(),
            max_price_gap_pct: default_max_price_gap_pct(),
        }
    }
}

impl RiskConfig {
    /// Enabled risk config with the given limits
    pub fn enabled(max_daily_loss_pct: f64, max_position_size: f64, max_price_gap_pct: f64) -> Self {
        Self {
            enabled: true,
            max_daily_loss_pct,
            max_position_size,
            max_price_gap_pct,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.max_daily_loss_pct.is_finite()
            && self.max_position_size.is_finite()
            && self.max_price_gap_pct.is_finite())
        {
            return Err(GridError::InvalidConfig(
                "risk limits must be finite".into(),
            ));
        }
        if self.max_daily_loss_pct <= 0.0 {
            return Err(GridError::InvalidConfig(
                "risk.max_daily_loss_pct must be positive".into(),
            ));
        }
        if self.max_position_size <= 0.0 {
            return Err(GridError::InvalidConfig(
                "risk.max_position_size must be positive".into(),
            ));
        }
        if self.max_price_gap_pct < 0.0 {
            return Err(GridError::InvalidConfig(
                "risk.max_price_gap_pct cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Grid bot configuration for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Spot symbol (e.g., "BTCUSDT")
    pub symbol: String,

    /// Lower price boundary for the grid
    pub lower_price: f64,

    /// Upper price boundary for the grid
    pub upper_price: f64,

    /// Number of grid intervals (creates grid_count + 1 levels)
    pub grid_count: u32,

    /// Total quote investment.
    /// Order quantity per level = (investment / grid_count) / level_price
    pub investment: f64,

    /// Quote coin used for the balance lookup; derived from the symbol when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_coin: Option<String>,

    /// Symbol precision; fetched from the exchange when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<AssetPrecision>,

    #[serde(default)]
    pub risk: RiskConfig,

    /// Re-bind resting orders found on the exchange at session start
    #[serde(default = "default_recover_open_orders")]
    pub recover_open_orders: bool,
}

fn default_recover_open_orders() -> bool {
    true
}

const KNOWN_QUOTES: [&str; 5] = ["USDT", "USDC", "BTC", "ETH", "EUR"];

impl GridConfig {
    /// Create a new grid configuration with required parameters
    pub fn new(
        symbol: impl Into<String>,
        lower_price: f64,
        upper_price: f64,
        grid_count: u32,
        investment: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            lower_price,
            upper_price,
            grid_count,
            investment,
            quote_coin: None,
            precision: None,
            risk: RiskConfig::default(),
            recover_open_orders: default_recover_open_orders(),
        }
    }

    /// Builder: set symbol precision
    pub fn with_precision(mut self, precision: AssetPrecision) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Builder: set risk guards
    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// Builder: set the quote coin explicitly
    pub fn with_quote_coin(mut self, coin: impl Into<String>) -> Self {
        self.quote_coin = Some(coin.into());
        self
    }

    /// Builder: toggle open-order recovery at start
    pub fn with_recovery(mut self, recover: bool) -> Self {
        self.recover_open_orders = recover;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if !self.lower_price.is_finite()
            || !self.upper_price.is_finite()
            || self.upper_price <= self.lower_price
            || self.grid_count < 1
            || self.grid_count > MAX_GRID_COUNT
        {
            return Err(GridError::InvalidRange {
                lower: self.lower_price,
                upper: self.upper_price,
                grid_count: self.grid_count,
            });
        }

        if self.lower_price <= 0.0 {
            return Err(GridError::InvalidConfig(
                "lower_price must be positive".into(),
            ));
        }

        if !self.investment.is_finite() || self.investment <= 0.0 {
            return Err(GridError::InvalidConfig(
                "investment must be positive".into(),
            ));
        }

        if self.symbol.trim().is_empty() {
            return Err(GridError::InvalidConfig("symbol cannot be empty".into()));
        }

        if let Some(precision) = &self.precision {
            self.validate_step(precision)?;
        }

        self.risk.validate()
    }

    /// Reject grids whose rungs would be closer than one price tick
    pub fn validate_step(&self, precision: &AssetPrecision) -> GridResult<()> {
        if self.price_step() < precision.price_tick() {
            return Err(GridError::InvalidConfig(format!(
                "price step {} is below the price tick {}",
                self.price_step(),
                precision.price_tick()
            )));
        }
        Ok(())
    }

    /// Calculate the price step between grid levels
    pub fn price_step(&self) -> f64 {
        (self.upper_price - self.lower_price) / self.grid_count as f64
    }

    /// Quote amount committed per buy level
    pub fn quote_per_level(&self) -> f64 {
        self.investment / self.grid_count as f64
    }

    /// Quantity for a buy at `price`, floored to precision
    pub fn buy_quantity_at(&self, price: f64, precision: &AssetPrecision) -> f64 {
        precision.floor_quantity(self.quote_per_level() / price)
    }

    /// Total number of levels (grid_count + 1)
    pub fn num_levels(&self) -> u32 {
        self.grid_count + 1
    }

    /// Quote coin for balance lookups
    pub fn quote_coin(&self) -> String {
        if let Some(coin) = &self.quote_coin {
            return coin.clone();
        }
        let symbol = self.symbol.to_uppercase();
        KNOWN_QUOTES
            .iter()
            .find(|q| symbol.ends_with(*q) && symbol.len() > q.len())
            .map(|q| q.to_string())
            .unwrap_or_else(|| "USDT".to_string())
    }

    /// Load config from JSON file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GridError::InvalidConfig(format!("cannot read grid config: {e}")))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| GridError::InvalidConfig(format!("cannot parse grid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = GridConfig::new("BTCUSDT", 100.0, 110.0, 5, 1000.0);
        assert!(config.validate().is_ok());

        // upper <= lower
        let config = GridConfig::new("BTCUSDT", 110.0, 100.0, 5, 1000.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidRange { .. })));
        let config = GridConfig::new("BTCUSDT", 100.0, 100.0, 5, 1000.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidRange { .. })));

        // grid_count < 1
        let config = GridConfig::new("BTCUSDT", 100.0, 110.0, 0, 1000.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidRange { .. })));

        // investment <= 0
        let config = GridConfig::new("BTCUSDT", 100.0, 110.0, 5, 0.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidConfig(_))));

        let config = GridConfig::new("  ", 100.0, 110.0, 5, 1000.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for investment in [f64::NAN, f64::INFINITY] {
            let config = GridConfig::new("BTCUSDT", 100.0, 110.0, 5, investment);
            assert!(matches!(config.validate(), Err(GridError::InvalidConfig(_))));
        }

        let config = GridConfig::new("BTCUSDT", 100.0, f64::INFINITY, 5, 1000.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidRange { .. })));
        let config = GridConfig::new("BTCUSDT", f64::NAN, 110.0, 5, 1000.0);
        assert!(config.validate().is_err());

        assert!(RiskConfig::enabled(f64::NAN, 10.0, 0.0).validate().is_err());
        assert!(RiskConfig::enabled(5.0, f64::INFINITY, 0.0).validate().is_err());
        assert!(RiskConfig::enabled(5.0, 10.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_step_must_cover_a_price_tick() {
        let config = GridConfig::new("BTCUSDT", 1.0, 1.0 + 1e-15, 100, 1000.0)
            .with_precision(AssetPrecision::new(2, 4));
        assert!(matches!(config.validate(), Err(GridError::InvalidConfig(_))));

        // 0.05 / 10 = 0.005 < 0.01
        let config = GridConfig::new("BTCUSDT", 100.0, 100.05, 10, 1000.0);
        assert!(config.validate().is_ok());
        assert!(config.validate_step(&AssetPrecision::new(2, 4)).is_err());
        assert!(config.validate_step(&AssetPrecision::new(3, 4)).is_ok());

        let config = GridConfig::new("BTCUSDT", 100.0, 110.0, MAX_GRID_COUNT + 1, 1000.0);
        assert!(matches!(config.validate(), Err(GridError::InvalidRange { .. })));
    }

    #[test]
    fn test_risk_validation_only_when_enabled() {
        let mut risk = RiskConfig::default();
        risk.max_daily_loss_pct = -1.0;
        assert!(risk.validate().is_ok());

        risk.enabled = true;
        assert!(risk.validate().is_err());

        assert!(RiskConfig::enabled(5.0, 10.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_buy_quantity_floors() {
        // $1000 over 5 grids => $200 per level
        let config = GridConfig::new("BTCUSDT", 100.0, 110.0, 5, 1000.0);
        let precision = AssetPrecision::new(2, 4);

        // 200 / 102 = 1.960784... -> 1.9607, never 1.9608
        let qty = config.buy_quantity_at(102.0, &precision);
        assert!((qty - 1.9607).abs() < 1e-12);

        assert!((config.buy_quantity_at(100.0, &precision) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantity_that_floors_to_zero() {
        let config = GridConfig::new("BTCUSDT", 60_000.0, 70_000.0, 10, 10.0);
        let precision = AssetPrecision::new(2, 4);
        // $1 / 60000 = 0.0000166 -> 0.0
        assert_eq!(config.buy_quantity_at(60_000.0, &precision), 0.0);
    }

    #[test]
    fn test_quote_coin_derivation() {
        assert_eq!(GridConfig::new("BTCUSDT", 1.0, 2.0, 1, 1.0).quote_coin(), "USDT");
        assert_eq!(GridConfig::new("ethusdc", 1.0, 2.0, 1, 1.0).quote_coin(), "USDC");
        assert_eq!(
            GridConfig::new("ETHBTC", 1.0, 2.0, 1, 1.0)
                .with_quote_coin("BTC")
                .quote_coin(),
            "BTC"
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "lower_price": 100.0,
            "upper_price": 110.0,
            "grid_count": 5,
            "investment": 1000.0
        }"#;
        let config: GridConfig = serde_json::from_str(json).unwrap();
        assert!(config.recover_open_orders);
        assert!(!config.risk.enabled);
        assert!(config.precision.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_precision_formatting() {
        let precision = AssetPrecision::new(2, 4);
        assert_eq!(precision.format_price(102.0), "102.00");
        assert_eq!(precision.format_quantity(1.9607), "1.9607");
        assert!((precision.price_tick() - 0.01).abs() < 1e-12);
        assert!((precision.round_price(101.996) - 102.0).abs() < 1e-12);
    }
}

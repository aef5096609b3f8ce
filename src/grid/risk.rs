//! Account-level risk guards

use log::warn;
use serde::{Deserialize, Serialize};

use super::config::RiskConfig;

/// Inputs evaluated by [`RiskManager::evaluate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskInputs {
    pub account_balance: f64,
    pub position_size: f64,
    pub daily_loss: f64,
    pub price_gap: bool,
}

/// Why a risk check failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskBreach {
    DailyLoss { loss_pct: f64, limit_pct: f64 },
    PositionSize { size: f64, limit: f64 },
    PriceGap,
}

impl std::fmt::Display for RiskBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBreach::DailyLoss { loss_pct, limit_pct } => {
                write!(f, "daily loss {loss_pct:.2}% exceeds {limit_pct:.2}%")
            }
            RiskBreach::PositionSize { size, limit } => {
                write!(f, "position size {size:.8} exceeds {limit:.8}")
            }
            RiskBreach::PriceGap => write!(f, "price gap between consecutive ticks"),
        }
    }
}

/// Outcome of a risk check
#[derive(Debug, Clone, PartialEq)]
pub enum RiskVerdict {
    Pass,
    Fail(RiskBreach),
}

impl RiskVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, RiskVerdict::Pass)
    }
}

/// Stateless evaluator of the configured limits
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Evaluate the guards in order: daily loss, position size, price gap
    pub fn evaluate(&self, inputs: &RiskInputs) -> RiskVerdict {
        if !self.config.enabled {
            return RiskVerdict::Pass;
        }

        let limit = self.config.max_daily_loss_pct / 100.0;
        if inputs.daily_loss > 0.0 {
            // A loss against an empty account is always over the limit
            let ratio = if inputs.account_balance > 0.0 {
                inputs.daily_loss / inputs.account_balance
            } else {
                f64::INFINITY
            };
            if ratio > limit {
                warn!(
                    "RISK ALERT: daily loss {:.2}% over limit {:.2}%",
                    ratio * 100.0,
                    self.config.max_daily_loss_pct
                );
                return RiskVerdict::Fail(RiskBreach::DailyLoss {
                    loss_pct: ratio * 100.0,
                    limit_pct: self.config.max_daily_loss_pct,
                });
            }
        }

        if inputs.position_size > self.config.max_position_size {
            warn!(
                "RISK ALERT: position size {:.8} over limit {:.8}",
                inputs.position_size, self.config.max_position_size
            );
            return RiskVerdict::Fail(RiskBreach::PositionSize {
                size: inputs.position_size,
                limit: self.config.max_position_size,
            });
        }

        if inputs.price_gap {
            warn!("RISK ALERT: significant price gap detected");
            return RiskVerdict::Fail(RiskBreach::PriceGap);
        }

        RiskVerdict::Pass
    }
}

/// Flags a relative jump between consecutive tick prices
#[derive(Debug, Clone)]
pub struct PriceGapDetector {
    /// Threshold as a fraction (0.1 = 10%); zero disables
    threshold: f64,
    last_price: Option<f64>,
}

impl PriceGapDetector {
    pub fn new(max_gap_pct: f64) -> Self {
        Self {
            threshold: max_gap_pct / 100.0,
            last_price: None,
        }
    }

    /// Record `price`; true if it moved more than the threshold since the last observation
    pub fn observe(&mut self, price: f64) -> bool {
        let gapped = match self.last_price {
            Some(last) if self.threshold > 0.0 && last > 0.0 => {
                ((price - last) / last).abs() > self.threshold
            }
            _ => false,
        };
        self.last_price = Some(price);
        gapped
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }
}

//! Tick-driven reconciliation of the grid against the exchange
//!
//! Each tick observes the price and the open-order set, folds any fills into
//! the grid, runs the risk guards and then places whatever orders are missing.
//! The exchange is the source of truth: nothing here remembers what it
//! "expects" to have happened between ticks, so replaying a tick with an
//! unchanged exchange is a no-op.

use std::collections::HashSet;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::consts::EPSILON;

use super::config::{AssetPrecision, GridConfig};
use super::errors::{GridError, GridResult};
use super::executor::GridExchange;
use super::model::Grid;
use super::risk::{PriceGapDetector, RiskBreach, RiskInputs, RiskManager, RiskVerdict};
use super::stats::{ProfitTracker, StatsSnapshot};
use super::types::{LevelState, OrderDetail, OrderRef, OrderSide, OrderStatus, RunState};

/// What a completed tick did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub price: f64,
    pub buys_filled: u32,
    pub sells_filled: u32,
    /// Orders released after a cancel or reject
    pub released: u32,
    pub placed: u32,
    pub placement_failures: u32,
    /// Levels skipped because their quantity floored to zero
    pub skipped: u32,
    pub anomalies: u32,
    pub realized_profit: f64,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Continue(TickReport),
    /// A risk guard failed; all tracked orders were cancelled
    Halted(RiskBreach),
}

/// Grid state plus the accounting and guards of one session
#[derive(Debug)]
pub struct ReconciliationEngine {
    config: GridConfig,
    precision: AssetPrecision,
    grid: Grid,
    tracker: ProfitTracker,
    risk: RiskManager,
    gap_detector: PriceGapDetector,
    run_state: RunState,
    last_price: Option<f64>,
}

impl ReconciliationEngine {
    /// Validate `config` and build the ladder
    pub fn new(config: GridConfig, precision: AssetPrecision) -> GridResult<Self> {
        config.validate()?;
        config.validate_step(&precision)?;
        let grid = Grid::build(config.lower_price, config.upper_price, config.grid_count)?;

        Ok(Self {
            tracker: ProfitTracker::new(config.investment),
            risk: RiskManager::new(config.risk.clone()),
            gap_detector: PriceGapDetector::new(config.risk.max_price_gap_pct),
            precision,
            grid,
            config,
            run_state: RunState::Idle,
            last_price: None,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn precision(&self) -> &AssetPrecision {
        &self.precision
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.tracker.snapshot()
    }

    pub fn mark_running(&mut self) {
        if self.run_state == RunState::Idle {
            self.run_state = RunState::Running;
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// Price or open-order failures abort the tick before any state changes.
    /// Failures on individual orders are logged and the tick carries on.
    pub async fn tick<E>(&mut self, exchange: &E) -> GridResult<TickOutcome>
    where
        E: GridExchange + ?Sized,
    {
        if self.run_state != RunState::Running {
            return Err(GridError::NotRunning(self.config.symbol.clone()));
        }
        let symbol = self.config.symbol.clone();

        let price = exchange
            .get_price(&symbol)
            .await
            .map_err(|source| GridError::MarketData {
                symbol: symbol.clone(),
                source,
            })?;

        let open_orders = exchange
            .get_open_orders(&symbol)
            .await
            .map_err(|source| GridError::ExchangeQuery {
                symbol: symbol.clone(),
                source,
            })?;
        let open_ids: HashSet<&str> = open_orders.iter().map(|o| o.order_id.as_str()).collect();

        self.tracker.roll_day(Utc::now().date_naive());
        let mut report = TickReport {
            price,
            ..Default::default()
        };

        // Tracked orders missing from the book have been filled or closed
        let missing: Vec<String> = self
            .grid
            .tracked_order_ids()
            .into_iter()
            .filter(|id| !open_ids.contains(id.as_str()))
            .collect();
        for order_id in missing {
            match exchange.get_order_detail(&symbol, &order_id).await {
                Ok(detail) => self.apply_order_detail(&order_id, detail, &mut report),
                Err(e) => warn!(
                    "[{}] order {} absent from book but detail lookup failed, retrying next tick: {}",
                    symbol, order_id, e
                ),
            }
        }

        let gap = self.gap_detector.observe(price);
        self.last_price = Some(price);

        if self.risk.is_enabled() {
            let balance = exchange
                .get_account_balance(&self.config.quote_coin())
                .await
                .map_err(|source| GridError::ExchangeQuery {
                    symbol: symbol.clone(),
                    source,
                })?;
            let verdict = self.risk.evaluate(&RiskInputs {
                account_balance: balance,
                position_size: self.tracker.position_size(),
                daily_loss: self.tracker.daily_loss(),
                price_gap: gap,
            });
            if let RiskVerdict::Fail(breach) = verdict {
                error!(
                    "[{}] {}; cancelling all orders",
                    symbol,
                    GridError::RiskLimitExceeded(breach.to_string())
                );
                self.shutdown(exchange).await;
                return Ok(TickOutcome::Halted(breach));
            }
        }

        for index in self.grid.levels_needing_buy(price) {
            let Some(level_price) = self.grid.level(index).map(|l| l.price) else {
                continue;
            };
            let quantity = self.config.buy_quantity_at(level_price, &self.precision);
            if !quantity.is_finite() || quantity <= 0.0 {
                warn!(
                    "[{}] buy quantity at level {} ({}) floors to zero, skipping",
                    symbol, index, level_price
                );
                report.skipped += 1;
                continue;
            }
            self.place(exchange, index, OrderSide::Buy, level_price, quantity, &mut report)
                .await;
        }

        for index in self.grid.levels_needing_sell(price) {
            let (Some(level), Some(sell_price)) =
                (self.grid.level(index), self.grid.sell_price_for(index))
            else {
                continue;
            };
            let quantity = self.precision.floor_quantity(level.held_quantity);
            if !quantity.is_finite() || quantity <= 0.0 {
                warn!(
                    "[{}] held quantity at level {} floors to zero, skipping sell",
                    symbol, index
                );
                report.skipped += 1;
                continue;
            }
            self.place(exchange, index, OrderSide::Sell, sell_price, quantity, &mut report)
                .await;
        }

        debug!(
            "[{}] tick @ {}: placed={} failed={} buys_filled={} sells_filled={} tracked={}",
            symbol,
            price,
            report.placed,
            report.placement_failures,
            report.buys_filled,
            report.sells_filled,
            self.grid.tracked_order_count()
        );

        Ok(TickOutcome::Continue(report))
    }

    /// Fold the exchange's view of a vanished order into the grid
    fn apply_order_detail(&mut self, order_id: &str, detail: OrderDetail, report: &mut TickReport) {
        let symbol = &self.config.symbol;

        if detail.status == OrderStatus::Open {
            debug!("[{}] order {} still open per detail, keeping", symbol, order_id);
            return;
        }

        let level_index = self.grid.find_level_by_order(order_id);
        let (_, released) = self.grid.release_order(order_id);
        let Some(order) = released else {
            let anomaly = GridError::ConsistencyAnomaly {
                symbol: symbol.clone(),
                order_id: order_id.to_string(),
                detail: format!("indexed at level {level_index:?} but not bound there"),
            };
            error!("{}", anomaly);
            self.tracker.record_anomaly();
            report.anomalies += 1;
            return;
        };

        match detail.status {
            OrderStatus::Filled => {
                let fill_price = detail.filled_price.unwrap_or(order.submitted_price);
                let quantity = detail.filled_quantity.unwrap_or(order.submitted_quantity);
                let Some(level) = self.grid.level_mut(order.level_index) else {
                    return;
                };
                match order.side {
                    OrderSide::Buy => {
                        level.mark_long(quantity);
                        self.tracker.record_buy(quantity);
                        report.buys_filled += 1;
                        info!(
                            "[{}] BUY filled at level {}: {} @ {}",
                            symbol, order.level_index, quantity, fill_price
                        );
                    }
                    OrderSide::Sell => {
                        if level.state != LevelState::Long {
                            warn!(
                                "[{}] sell {} filled on level {} that was not LONG",
                                symbol, order_id, order.level_index
                            );
                        }
                        let entry_price = level.price;
                        level.mark_empty();
                        let profit = self.tracker.record_sell(
                            order.level_index,
                            entry_price,
                            fill_price,
                            quantity,
                        );
                        report.sells_filled += 1;
                        report.realized_profit += profit;
                        info!(
                            "[{}] SELL filled at level {}: {} @ {} (profit {:.4}, total {:.4})",
                            symbol,
                            order.level_index,
                            quantity,
                            fill_price,
                            profit,
                            self.tracker.total_profit()
                        );
                    }
                }
            }
            OrderStatus::Canceled | OrderStatus::Rejected => {
                report.released += 1;
                info!(
                    "[{}] {:?} order {} at level {} closed as {:?}, level re-armed",
                    symbol, order.side, order_id, order.level_index, detail.status
                );
            }
            OrderStatus::Open => {}
        }
    }

    async fn place<E>(
        &mut self,
        exchange: &E,
        index: u32,
        side: OrderSide,
        price: f64,
        quantity: f64,
        report: &mut TickReport,
    ) where
        E: GridExchange + ?Sized,
    {
        let symbol = self.config.symbol.clone();
        match exchange
            .place_limit_order(&symbol, side, price, quantity, &self.precision)
            .await
        {
            Ok(order_id) => {
                let order = OrderRef::new(order_id.clone(), index, side, price, quantity);
                if let Err(e) = self.grid.bind_order(order) {
                    // Untrackable: pull it back off the book
                    error!("[{}] cannot bind order {}: {}", symbol, order_id, e);
                    if let Err(e) = exchange.cancel_order(&symbol, &order_id).await {
                        error!("[{}] cancel of unbound order {} failed: {}", symbol, order_id, e);
                    }
                    report.placement_failures += 1;
                    return;
                }
                report.placed += 1;
                info!(
                    "[{}] placed {} at level {}: {} @ {} ({})",
                    symbol,
                    side.as_str(),
                    index,
                    quantity,
                    price,
                    order_id
                );
            }
            Err(e) => {
                let err = GridError::Placement {
                    symbol: symbol.clone(),
                    level: index,
                    side,
                    reason: e.to_string(),
                };
                error!("{}", err);
                report.placement_failures += 1;
            }
        }
    }

    /// Cancel every tracked order, releasing each ref whatever the outcome.
    ///
    /// Returns how many cancels the exchange acknowledged.
    pub async fn cancel_all<E>(&mut self, exchange: &E) -> u32
    where
        E: GridExchange + ?Sized,
    {
        let symbol = self.config.symbol.clone();
        let mut cancelled = 0;
        for order_id in self.grid.tracked_order_ids() {
            match exchange.cancel_order(&symbol, &order_id).await {
                Ok(()) => cancelled += 1,
                Err(e) => error!(
                    "{}",
                    GridError::Cancellation {
                        symbol: symbol.clone(),
                        order_id: order_id.clone(),
                        reason: e.to_string(),
                    }
                ),
            }
            self.grid.release_order(&order_id);
        }
        cancelled
    }

    /// Transition through stopping to stopped, cancelling on the way
    pub async fn shutdown<E>(&mut self, exchange: &E) -> u32
    where
        E: GridExchange + ?Sized,
    {
        if self.run_state == RunState::Stopped {
            return 0;
        }
        self.run_state = RunState::Stopping;
        let cancelled = self.cancel_all(exchange).await;
        self.run_state = RunState::Stopped;
        info!(
            "[{}] stopped: {} orders cancelled, total profit {:.4}",
            self.config.symbol,
            cancelled,
            self.tracker.total_profit()
        );
        cancelled
    }

    /// Re-bind orders already resting on the book at startup.
    ///
    /// A buy is adopted by the non-top level at its price; a sell by the level
    /// whose sell target matches, which is then LONG the sell's size. Matching
    /// allows half a tick of slack. Unmatched orders are left alone.
    pub async fn recover_open_orders<E>(&mut self, exchange: &E) -> GridResult<usize>
    where
        E: GridExchange + ?Sized,
    {
        let symbol = self.config.symbol.clone();
        let mut open_orders = exchange
            .get_open_orders(&symbol)
            .await
            .map_err(|source| GridError::ExchangeQuery {
                symbol: symbol.clone(),
                source,
            })?;
        open_orders.sort_by(|a, b| a.price.total_cmp(&b.price));

        let tolerance = (self.precision.price_tick() / 2.0).max(EPSILON);
        let top = self.grid.top_index();
        let mut adopted = 0;

        for order in open_orders {
            let candidate = self.grid.levels().iter().find(|l| {
                let target = match order.side {
                    OrderSide::Buy if l.index < top => Some(l.price),
                    OrderSide::Buy => None,
                    OrderSide::Sell => self.grid.sell_price_for(l.index),
                };
                target.is_some_and(|p| (p - order.price).abs() <= tolerance)
                    && l.state == LevelState::Empty
                    && !l.has_open_order()
            });
            let Some(index) = candidate.map(|l| l.index) else {
                info!(
                    "[{}] leaving unmatched {} order {} @ {} untouched",
                    symbol,
                    order.side.as_str(),
                    order.order_id,
                    order.price
                );
                continue;
            };

            let order_ref = OrderRef::new(
                order.order_id.clone(),
                index,
                order.side,
                order.price,
                order.quantity,
            );
            if let Err(e) = self.grid.bind_order(order_ref) {
                warn!("[{}] cannot adopt order {}: {}", symbol, order.order_id, e);
                continue;
            }
            if order.side == OrderSide::Sell {
                if let Some(level) = self.grid.level_mut(index) {
                    level.mark_long(order.quantity);
                }
                self.tracker.adopt_position(order.quantity);
            }
            adopted += 1;
            info!(
                "[{}] adopted {} order {} at level {}",
                symbol,
                order.side.as_str(),
                order.order_id,
                index
            );
        }

        Ok(adopted)
    }
}

//! Grid model: the ordered price levels and the orders bound to them
//!
//! Orders are reachable two ways: through the level that owns them, and
//! through `order_index` (order id -> level) so fill reconciliation never has
//! to scan the ladder. Both are updated together by [`Grid::bind_order`] and
//! [`Grid::release_order`]; nothing else mutates a level's order slots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};
use crate::consts::MAX_GRID_COUNT;
use super::types::{GridLevel, LevelState, OrderRef, OrderSide};

/// Ordered price ladder, immutable in shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    levels: Vec<GridLevel>,
    order_index: HashMap<String, u32>,
}

impl Grid {
    /// Build `grid_count + 1` evenly spaced levels from `lower` to `upper`
    pub fn build(lower: f64, upper: f64, grid_count: u32) -> GridResult<Self> {
        if upper <= lower
            || grid_count < 1
            || grid_count > MAX_GRID_COUNT
            || !lower.is_finite()
            || !upper.is_finite()
        {
            return Err(GridError::InvalidRange {
                lower,
                upper,
                grid_count,
            });
        }

        let step = (upper - lower) / grid_count as f64;
        let levels: Vec<GridLevel> = (0..=grid_count)
            .map(|i| {
                // Pin the last rung so accumulated float error never moves it
                let price = if i == grid_count {
                    upper
                } else {
                    lower + i as f64 * step
                };
                GridLevel::new(i, price)
            })
            .collect();

        // A step below float resolution collapses neighbouring rungs
        if levels.windows(2).any(|pair| pair[1].price <= pair[0].price) {
            return Err(GridError::InvalidRange {
                lower,
                upper,
                grid_count,
            });
        }

        Ok(Self {
            levels,
            order_index: HashMap::new(),
        })
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Index of the highest level
    pub fn top_index(&self) -> u32 {
        self.levels.len().saturating_sub(1) as u32
    }

    pub fn level(&self, index: u32) -> Option<&GridLevel> {
        self.levels.get(index as usize)
    }

    pub(crate) fn level_mut(&mut self, index: u32) -> Option<&mut GridLevel> {
        self.levels.get_mut(index as usize)
    }

    /// Level owning `order_id`, if tracked
    pub fn find_level_by_order(&self, order_id: &str) -> Option<u32> {
        self.order_index.get(order_id).copied()
    }

    /// All order ids currently bound, ascending by level
    pub fn tracked_order_ids(&self) -> Vec<String> {
        let mut ids: Vec<(u32, &String)> =
            self.order_index.iter().map(|(id, idx)| (*idx, id)).collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn tracked_order_count(&self) -> usize {
        self.order_index.len()
    }

    /// Price at which the sell closing level `index` is submitted (the next rung up)
    pub fn sell_price_for(&self, index: u32) -> Option<f64> {
        self.level(index.checked_add(1)?).map(|l| l.price)
    }

    /// Levels strictly below `current_price`, EMPTY and without a buy order.
    ///
    /// The top rung is only ever a sell target, so it never arms a buy.
    pub fn levels_needing_buy(&self, current_price: f64) -> Vec<u32> {
        let top = self.top_index();
        self.levels
            .iter()
            .filter(|l| {
                l.index < top
                    && l.price < current_price
                    && l.state == LevelState::Empty
                    && l.buy_order.is_none()
            })
            .map(|l| l.index)
            .collect()
    }

    /// LONG levels without a sell order whose sell price is strictly above `current_price`
    pub fn levels_needing_sell(&self, current_price: f64) -> Vec<u32> {
        self.levels
            .iter()
            .filter(|l| l.state == LevelState::Long && l.sell_order.is_none())
            .filter(|l| {
                self.sell_price_for(l.index)
                    .is_some_and(|sell_price| sell_price > current_price)
            })
            .map(|l| l.index)
            .collect()
    }

    /// Bind a freshly placed order to its level.
    ///
    /// Refuses when the (level, side) slot is taken, when the opposite side
    /// already has an order, or when the order id is already tracked.
    pub fn bind_order(&mut self, order: OrderRef) -> GridResult<()> {
        if self.order_index.contains_key(&order.order_id) {
            return Err(GridError::DuplicateOrder(order.order_id));
        }

        let level = self
            .levels
            .get_mut(order.level_index as usize)
            .ok_or(GridError::LevelNotFound(order.level_index))?;

        if level.order(order.side).is_some() || level.order(order.side.opposite()).is_some() {
            return Err(GridError::LevelOccupied {
                level: order.level_index,
                side: order.side,
            });
        }

        let side = order.side;
        self.order_index
            .insert(order.order_id.clone(), order.level_index);
        *level.order_slot(side) = Some(order);
        Ok(())
    }

    /// Unbind `order_id` from the index and from its level.
    ///
    /// Returns the index entry (if any) and the ref found on the level (if the
    /// level exists and still holds that id). A mismatch between the two is a
    /// consistency anomaly the caller must surface.
    pub fn release_order(&mut self, order_id: &str) -> (Option<u32>, Option<OrderRef>) {
        let Some(index) = self.order_index.remove(order_id) else {
            return (None, None);
        };

        let released = self.levels.get_mut(index as usize).and_then(|level| {
            [OrderSide::Buy, OrderSide::Sell].into_iter().find_map(|side| {
                let slot = level.order_slot(side);
                if slot.as_ref().is_some_and(|o| o.order_id == order_id) {
                    slot.take()
                } else {
                    None
                }
            })
        });

        (Some(index), released)
    }

    /// Check that no level carries both a buy and a sell
    pub fn check_exclusivity(&self) -> bool {
        self.levels
            .iter()
            .all(|l| !(l.buy_order.is_some() && l.sell_order.is_some()))
    }

    #[cfg(test)]
    pub(crate) fn corrupt_index(&mut self, order_id: &str, index: u32) {
        self.order_index.insert(order_id.to_string(), index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_ref(id: &str, level: u32, price: f64) -> OrderRef {
        OrderRef::new(id, level, OrderSide::Buy, price, 1.0)
    }

    #[test]
    fn test_build_scenario_levels() {
        let grid = Grid::build(100.0, 110.0, 5).unwrap();
        let prices: Vec<f64> = grid.levels().iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0]);
    }

    #[test]
    fn test_build_prices_strictly_increasing_with_pinned_bounds() {
        for &(lower, upper, count) in &[
            (0.1, 0.3, 7u32),
            (1.0, 1.0001, 3),
            (25_000.0, 31_337.7, 97),
            (0.00001234, 0.0000999, 13),
            (100.0, 110.0, 1),
        ] {
            let grid = Grid::build(lower, upper, count).unwrap();
            assert_eq!(grid.len(), count as usize + 1);
            assert_eq!(grid.levels()[0].price, lower);
            assert_eq!(grid.levels()[count as usize].price, upper);
            for pair in grid.levels().windows(2) {
                assert!(pair[0].price < pair[1].price);
                assert_eq!(pair[0].index + 1, pair[1].index);
            }
        }
    }

    #[test]
    fn test_build_rejects_invalid_range() {
        assert!(matches!(
            Grid::build(110.0, 100.0, 5),
            Err(GridError::InvalidRange { .. })
        ));
        assert!(matches!(
            Grid::build(100.0, 100.0, 5),
            Err(GridError::InvalidRange { .. })
        ));
        assert!(matches!(
            Grid::build(100.0, 110.0, 0),
            Err(GridError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_build_rejects_collapsed_rungs() {
        // Step below one ulp of the bounds: neighbours would share a price
        assert!(matches!(
            Grid::build(1.0, 1.0 + 1e-15, 100),
            Err(GridError::InvalidRange { .. })
        ));
        assert!(matches!(
            Grid::build(100.0, 110.0, MAX_GRID_COUNT + 1),
            Err(GridError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_levels_needing_buy_and_sell_scenario() {
        let grid = Grid::build(100.0, 110.0, 5).unwrap();
        assert_eq!(grid.levels_needing_buy(105.0), vec![0, 1, 2]);
        assert!(grid.levels_needing_sell(105.0).is_empty());
    }

    #[test]
    fn test_buy_query_is_strict_and_skips_top_level() {
        let grid = Grid::build(100.0, 110.0, 5).unwrap();
        // Exactly on a rung: that rung does not qualify
        assert_eq!(grid.levels_needing_buy(104.0), vec![0, 1]);
        // Above the range: every rung but the top
        assert_eq!(grid.levels_needing_buy(200.0), vec![0, 1, 2, 3, 4]);
        assert!(grid.levels_needing_buy(100.0).is_empty());
    }

    #[test]
    fn test_sell_query_uses_next_rung() {
        let mut grid = Grid::build(100.0, 110.0, 5).unwrap();
        grid.level_mut(1).unwrap().mark_long(1.0); // bought at 102, sells at 104
        grid.level_mut(3).unwrap().mark_long(1.0); // bought at 106, sells at 108

        assert_eq!(grid.levels_needing_sell(101.0), vec![1, 3]);
        assert_eq!(grid.levels_needing_sell(105.0), vec![3]);
        assert!(grid.levels_needing_sell(108.0).is_empty());
        assert_eq!(grid.sell_price_for(1), Some(104.0));
        assert_eq!(grid.sell_price_for(5), None);
    }

    #[test]
    fn test_bind_and_find() {
        let mut grid = Grid::build(100.0, 110.0, 5).unwrap();
        grid.bind_order(buy_ref("a1", 2, 104.0)).unwrap();

        assert_eq!(grid.find_level_by_order("a1"), Some(2));
        assert_eq!(grid.find_level_by_order("zz"), None);
        assert!(grid.level(2).unwrap().buy_order.is_some());
        assert_eq!(grid.levels_needing_buy(105.0), vec![0, 1]);
    }

    #[test]
    fn test_bind_enforces_one_order_per_level() {
        let mut grid = Grid::build(100.0, 110.0, 5).unwrap();
        grid.bind_order(buy_ref("a1", 2, 104.0)).unwrap();

        // Same side again
        assert!(matches!(
            grid.bind_order(buy_ref("a2", 2, 104.0)),
            Err(GridError::LevelOccupied { level: 2, .. })
        ));
        // Opposite side while the buy rests
        let sell = OrderRef::new("a3", 2, OrderSide::Sell, 106.0, 1.0);
        assert!(matches!(
            grid.bind_order(sell),
            Err(GridError::LevelOccupied { level: 2, side: OrderSide::Sell })
        ));
        // Duplicate id on another level
        assert!(matches!(
            grid.bind_order(buy_ref("a1", 0, 100.0)),
            Err(GridError::DuplicateOrder(_))
        ));
        // Unknown level
        assert!(matches!(
            grid.bind_order(buy_ref("a4", 42, 1.0)),
            Err(GridError::LevelNotFound(42))
        ));

        assert_eq!(grid.tracked_order_count(), 1);
        assert!(grid.check_exclusivity());
    }

    #[test]
    fn test_release_order() {
        let mut grid = Grid::build(100.0, 110.0, 5).unwrap();
        grid.bind_order(buy_ref("a1", 2, 104.0)).unwrap();

        let (index, released) = grid.release_order("a1");
        assert_eq!(index, Some(2));
        assert_eq!(released.unwrap().order_id, "a1");
        assert!(grid.level(2).unwrap().buy_order.is_none());
        assert_eq!(grid.find_level_by_order("a1"), None);

        assert_eq!(grid.release_order("a1"), (None, None));
    }

    #[test]
    fn test_release_detects_dangling_index() {
        let mut grid = Grid::build(100.0, 110.0, 5).unwrap();
        grid.corrupt_index("ghost", 99);

        let (index, released) = grid.release_order("ghost");
        assert_eq!(index, Some(99));
        assert!(released.is_none());
        assert_eq!(grid.tracked_order_count(), 0);
    }

    #[test]
    fn test_tracked_order_ids_sorted_by_level() {
        let mut grid = Grid::build(100.0, 110.0, 5).unwrap();
        grid.bind_order(buy_ref("c", 3, 106.0)).unwrap();
        grid.bind_order(buy_ref("a", 0, 100.0)).unwrap();
        grid.bind_order(buy_ref("b", 1, 102.0)).unwrap();
        assert_eq!(grid.tracked_order_ids(), vec!["a", "b", "c"]);
    }
}

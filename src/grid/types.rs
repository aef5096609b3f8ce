//! Core data types for grid trading

use serde::{Deserialize, Serialize};

/// Order side for grid levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Convert to exchange side string
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl TryFrom<&str> for OrderSide {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "b" => Ok(OrderSide::Buy),
            "sell" | "s" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side {other:?}")),
        }
    }
}

/// Position state of a grid level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelState {
    /// Nothing held here; the buy side may be armed
    Empty,
    /// A buy filled here; the sell side may be armed to close it
    Long,
}

/// Binding between an exchange order and the level that placed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRef {
    /// Exchange-assigned order id
    pub order_id: String,
    /// Owning level
    pub level_index: u32,
    pub side: OrderSide,
    /// Price sent at placement
    pub submitted_price: f64,
    /// Quantity sent at placement
    pub submitted_quantity: f64,
}

impl OrderRef {
    pub fn new(
        order_id: impl Into<String>,
        level_index: u32,
        side: OrderSide,
        submitted_price: f64,
        submitted_quantity: f64,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            level_index,
            side,
            submitted_price,
            submitted_quantity,
        }
    }
}

/// Individual grid level tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLevel {
    /// Index of this level (0 = lowest price)
    pub index: u32,
    /// Price at this level
    pub price: f64,
    /// Resting buy order, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_order: Option<OrderRef>,
    /// Resting sell order, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_order: Option<OrderRef>,
    pub state: LevelState,
    /// Base quantity acquired by the buy that made this level LONG
    pub held_quantity: f64,
}

impl GridLevel {
    /// Create a new grid level
    pub fn new(index: u32, price: f64) -> Self {
        Self {
            index,
            price,
            buy_order: None,
            sell_order: None,
            state: LevelState::Empty,
            held_quantity: 0.0,
        }
    }

    /// Order bound to `side`, if any
    pub fn order(&self, side: OrderSide) -> Option<&OrderRef> {
        match side {
            OrderSide::Buy => self.buy_order.as_ref(),
            OrderSide::Sell => self.sell_order.as_ref(),
        }
    }

    pub(crate) fn order_slot(&mut self, side: OrderSide) -> &mut Option<OrderRef> {
        match side {
            OrderSide::Buy => &mut self.buy_order,
            OrderSide::Sell => &mut self.sell_order,
        }
    }

    /// Check if this level has any resting order
    pub fn has_open_order(&self) -> bool {
        self.buy_order.is_some() || self.sell_order.is_some()
    }

    /// Record a filled buy: the level now holds `quantity`
    pub fn mark_long(&mut self, quantity: f64) {
        self.state = LevelState::Long;
        self.held_quantity = quantity;
    }

    /// Record a filled sell: the level is flat again
    pub fn mark_empty(&mut self) {
        self.state = LevelState::Empty;
        self.held_quantity = 0.0;
    }
}

/// An order currently resting on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
}

/// Exchange-side lifecycle of a single order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Check if the order is no longer working
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

/// Order detail lookup result
///
/// `filled_price`/`filled_quantity` are optional because the exchange may omit
/// them; callers fall back to the submitted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_quantity: Option<f64>,
}

impl OrderDetail {
    pub fn filled(price: f64, quantity: f64) -> Self {
        Self {
            status: OrderStatus::Filled,
            filled_price: Some(price),
            filled_quantity: Some(quantity),
        }
    }

    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status,
            filled_price: None,
            filled_quantity: None,
        }
    }
}

/// Session run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Constructed, loop not started yet
    Idle,
    /// Reconciling on every tick
    Running,
    /// Cancelling outstanding orders
    Stopping,
    /// Fully stopped
    Stopped,
}

impl RunState {
    /// Check if the session is still trading
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Idle | RunState::Running)
    }
}

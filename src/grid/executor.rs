//! Exchange abstraction for grid trading - enables mocking for tests

use async_trait::async_trait;

use crate::bitget::BitgetClient;
use crate::errors::Result;

use super::config::AssetPrecision;
use super::types::{OpenOrder, OrderDetail, OrderSide};

/// Exchange operations the reconciliation engine depends on
///
/// Errors are transport-level; the engine attaches the symbol and decides
/// whether the tick aborts or continues.
#[async_trait]
pub trait GridExchange: Send + Sync {
    /// Last traded price
    async fn get_price(&self, symbol: &str) -> Result<f64>;

    /// Orders currently resting on the book for `symbol`
    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>>;

    /// Lifecycle and fill information for one order
    async fn get_order_detail(&self, symbol: &str, order_id: &str) -> Result<OrderDetail>;

    /// Place a GTC limit order; returns the exchange order id
    async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
        precision: &AssetPrecision,
    ) -> Result<String>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;

    /// Available balance of `coin`
    async fn get_account_balance(&self, coin: &str) -> Result<f64>;

    /// Price and quantity decimals accepted for `symbol`
    async fn get_symbol_precision(&self, symbol: &str) -> Result<AssetPrecision>;
}

#[async_trait]
impl GridExchange for BitgetClient {
    async fn get_price(&self, symbol: &str) -> Result<f64> {
        self.last_price(symbol).await
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>> {
        self.unfilled_orders(symbol).await
    }

    async fn get_order_detail(&self, symbol: &str, order_id: &str) -> Result<OrderDetail> {
        self.order_info(symbol, order_id).await
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
        precision: &AssetPrecision,
    ) -> Result<String> {
        BitgetClient::place_limit_order(self, symbol, side, price, quantity, precision).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        BitgetClient::cancel_order(self, symbol, order_id).await
    }

    async fn get_account_balance(&self, coin: &str) -> Result<f64> {
        self.available_balance(coin).await
    }

    async fn get_symbol_precision(&self, symbol: &str) -> Result<AssetPrecision> {
        self.symbol_precision(symbol).await
    }
}

pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use crate::errors::Error;
    use crate::grid::types::OrderStatus;

    /// Order submitted through the mock
    #[derive(Debug, Clone, PartialEq)]
    pub struct PlacedOrder {
        pub order_id: String,
        pub symbol: String,
        pub side: OrderSide,
        pub price: f64,
        pub quantity: f64,
    }

    fn mock_failure(endpoint: &str) -> Error {
        Error::Http {
            endpoint: endpoint.to_string(),
            status: Some(503),
            message: "mock failure".to_string(),
        }
    }

    /// Scripted in-memory exchange
    ///
    /// Placed orders rest in `open_orders` until a test fills or cancels them.
    pub struct MockExchange {
        pub price: Arc<Mutex<f64>>,
        pub open_orders: Arc<Mutex<Vec<OpenOrder>>>,
        pub details: Arc<Mutex<HashMap<String, OrderDetail>>>,
        pub placed: Arc<Mutex<Vec<PlacedOrder>>>,
        pub cancelled: Arc<Mutex<Vec<String>>>,
        pub balance: Arc<Mutex<f64>>,
        pub precision: Arc<Mutex<AssetPrecision>>,
        /// Placements at these prices fail
        pub reject_prices: Arc<Mutex<Vec<f64>>>,
        /// Detail lookups for these ids fail
        pub failing_details: Arc<Mutex<HashSet<String>>>,
        pub fail_price: Arc<Mutex<bool>>,
        pub fail_open_orders: Arc<Mutex<bool>>,
        pub fail_cancels: Arc<Mutex<bool>>,
        pub detail_calls: AtomicU64,
        next_oid: AtomicU64,
    }

    impl MockExchange {
        pub fn new(price: f64) -> Self {
            Self {
                price: Arc::new(Mutex::new(price)),
                open_orders: Arc::new(Mutex::new(Vec::new())),
                details: Arc::new(Mutex::new(HashMap::new())),
                placed: Arc::new(Mutex::new(Vec::new())),
                cancelled: Arc::new(Mutex::new(Vec::new())),
                balance: Arc::new(Mutex::new(10_000.0)),
                precision: Arc::new(Mutex::new(AssetPrecision::default())),
                reject_prices: Arc::new(Mutex::new(Vec::new())),
                failing_details: Arc::new(Mutex::new(HashSet::new())),
                fail_price: Arc::new(Mutex::new(false)),
                fail_open_orders: Arc::new(Mutex::new(false)),
                fail_cancels: Arc::new(Mutex::new(false)),
                detail_calls: AtomicU64::new(0),
                next_oid: AtomicU64::new(1),
            }
        }

        pub async fn set_price(&self, price: f64) {
            *self.price.lock().await = price;
        }

        pub async fn set_balance(&self, balance: f64) {
            *self.balance.lock().await = balance;
        }

        pub async fn set_precision(&self, precision: AssetPrecision) {
            *self.precision.lock().await = precision;
        }

        pub async fn reject_placements_at(&self, price: f64) {
            self.reject_prices.lock().await.push(price);
        }

        pub async fn set_fail_price(&self, fail: bool) {
            *self.fail_price.lock().await = fail;
        }

        pub async fn set_fail_open_orders(&self, fail: bool) {
            *self.fail_open_orders.lock().await = fail;
        }

        pub async fn set_fail_cancels(&self, fail: bool) {
            *self.fail_cancels.lock().await = fail;
        }

        pub async fn fail_detail_for(&self, order_id: &str) {
            self.failing_details.lock().await.insert(order_id.to_string());
        }

        /// Put an order on the book as if placed by someone else (or a previous run)
        pub async fn seed_open_order(&self, side: OrderSide, price: f64, quantity: f64) -> String {
            let order_id = format!("seed-{}", self.next_oid.fetch_add(1, Ordering::SeqCst));
            self.open_orders.lock().await.push(OpenOrder {
                order_id: order_id.clone(),
                side,
                price,
                quantity,
            });
            order_id
        }

        /// Fill a resting order at `price` for `quantity`
        pub async fn fill(&self, order_id: &str, price: f64, quantity: f64) {
            self.open_orders.lock().await.retain(|o| o.order_id != order_id);
            self.details
                .lock()
                .await
                .insert(order_id.to_string(), OrderDetail::filled(price, quantity));
        }

        /// Fill a resting order at its own price and size
        pub async fn fill_at_limit(&self, order_id: &str) -> bool {
            let order = self
                .open_orders
                .lock()
                .await
                .iter()
                .find(|o| o.order_id == order_id)
                .cloned();
            match order {
                Some(o) => {
                    self.fill(order_id, o.price, o.quantity).await;
                    true
                }
                None => false,
            }
        }

        /// Remove an order from the book with a terminal non-fill status
        pub async fn close_without_fill(&self, order_id: &str, status: OrderStatus) {
            self.open_orders.lock().await.retain(|o| o.order_id != order_id);
            self.details
                .lock()
                .await
                .insert(order_id.to_string(), OrderDetail::with_status(status));
        }

        /// Id of the resting order at `price` on `side`, if any
        pub async fn open_order_at(&self, side: OrderSide, price: f64) -> Option<String> {
            self.open_orders
                .lock()
                .await
                .iter()
                .find(|o| o.side == side && (o.price - price).abs() < 1e-9)
                .map(|o| o.order_id.clone())
        }

        pub async fn placed_count(&self) -> usize {
            self.placed.lock().await.len()
        }
    }

    #[async_trait]
    impl GridExchange for MockExchange {
        async fn get_price(&self, _symbol: &str) -> Result<f64> {
            if *self.fail_price.lock().await {
                return Err(mock_failure("price"));
            }
            Ok(*self.price.lock().await)
        }

        async fn get_open_orders(&self, _symbol: &str) -> Result<Vec<OpenOrder>> {
            if *self.fail_open_orders.lock().await {
                return Err(mock_failure("open-orders"));
            }
            Ok(self.open_orders.lock().await.clone())
        }

        async fn get_order_detail(&self, _symbol: &str, order_id: &str) -> Result<OrderDetail> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_details.lock().await.contains(order_id) {
                return Err(mock_failure("order-detail"));
            }
            if let Some(detail) = self.details.lock().await.get(order_id) {
                return Ok(detail.clone());
            }
            if self.open_orders.lock().await.iter().any(|o| o.order_id == order_id) {
                return Ok(OrderDetail::with_status(OrderStatus::Open));
            }
            Err(Error::InvalidResponse {
                endpoint: "order-detail".to_string(),
                message: format!("order {order_id} not found"),
            })
        }

        async fn place_limit_order(
            &self,
            symbol: &str,
            side: OrderSide,
            price: f64,
            quantity: f64,
            _precision: &AssetPrecision,
        ) -> Result<String> {
            if self
                .reject_prices
                .lock()
                .await
                .iter()
                .any(|p| (p - price).abs() < 1e-9)
            {
                return Err(Error::Api {
                    endpoint: "place-order".to_string(),
                    code: "43012".to_string(),
                    msg: "mock rejection".to_string(),
                });
            }

            let order_id = format!("oid-{}", self.next_oid.fetch_add(1, Ordering::SeqCst));
            self.placed.lock().await.push(PlacedOrder {
                order_id: order_id.clone(),
                symbol: symbol.to_string(),
                side,
                price,
                quantity,
            });
            self.open_orders.lock().await.push(OpenOrder {
                order_id: order_id.clone(),
                side,
                price,
                quantity,
            });
            Ok(order_id)
        }

        async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<()> {
            if *self.fail_cancels.lock().await {
                return Err(mock_failure("cancel-order"));
            }
            self.open_orders.lock().await.retain(|o| o.order_id != order_id);
            self.details.lock().await.insert(
                order_id.to_string(),
                OrderDetail::with_status(OrderStatus::Canceled),
            );
            self.cancelled.lock().await.push(order_id.to_string());
            Ok(())
        }

        async fn get_account_balance(&self, _coin: &str) -> Result<f64> {
            Ok(*self.balance.lock().await)
        }

        async fn get_symbol_precision(&self, _symbol: &str) -> Result<AssetPrecision> {
            Ok(*self.precision.lock().await)
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use spot_grid_bot::grid::executor::mock::MockExchange;
use spot_grid_bot::grid::{
    AssetPrecision, GridConfig, GridError, LevelState, OrderSide, ReconciliationEngine, RunState,
    SessionStatus, SessionSupervisor, TickOutcome,
};

const TICK: Duration = Duration::from_millis(20);

fn scenario_config() -> GridConfig {
    GridConfig::new("BTCUSDT", 100.0, 110.0, 5, 1000.0).with_precision(AssetPrecision::new(2, 4))
}

async fn wait_until<F>(supervisor: &SessionSupervisor<MockExchange>, symbol: &str, mut cond: F) -> SessionStatus
where
    F: FnMut(&SessionStatus) -> bool,
{
    for _ in 0..200 {
        let status = supervisor.status(symbol).await.unwrap();
        if cond(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached for {symbol}");
}

#[tokio::test]
async fn full_round_trip_through_supervisor() {
    let exchange = Arc::new(MockExchange::new(105.0));
    let supervisor = SessionSupervisor::new(exchange.clone(), TICK);

    supervisor.start(scenario_config()).await.unwrap();
    wait_until(&supervisor, "BTCUSDT", |s| s.tracked_orders == 3).await;

    // Buy at 102 fills, a sell is armed at 104
    let buy = exchange.open_order_at(OrderSide::Buy, 102.0).await.unwrap();
    assert!(exchange.fill_at_limit(&buy).await);
    exchange.set_price(103.0).await;
    let status = wait_until(&supervisor, "BTCUSDT", |s| {
        s.levels[1].state == LevelState::Long && s.levels[1].sell_order.is_some()
    })
    .await;
    assert_eq!(status.stats.fill_counts.buys, 1);
    assert!((status.stats.position_size - 1.9607).abs() < 1e-9);

    let sell = exchange.open_order_at(OrderSide::Sell, 104.0).await.unwrap();
    assert!(exchange.fill_at_limit(&sell).await);
    exchange.set_price(104.5).await;
    let status = wait_until(&supervisor, "BTCUSDT", |s| s.stats.fill_counts.sells == 1).await;

    // (104 - 102) * 1.9607
    assert!((status.stats.total_profit - 3.9214).abs() < 1e-9);
    assert!(status.stats.position_size.abs() < 1e-9);
    assert_eq!(status.levels[1].state, LevelState::Empty);
    assert_eq!(status.state, RunState::Running);

    let final_status = supervisor.stop("BTCUSDT").await.unwrap();
    assert_eq!(final_status.state, RunState::Stopped);
    assert_eq!(final_status.tracked_orders, 0);
    assert!(exchange.open_orders.lock().await.is_empty());
}

#[tokio::test]
async fn one_order_per_level_holds_across_ticks() {
    let exchange = MockExchange::new(105.0);
    let mut engine = ReconciliationEngine::new(scenario_config(), AssetPrecision::new(2, 4)).unwrap();
    engine.mark_running();

    let prices = [105.0, 103.0, 107.0, 101.0, 109.0, 104.5, 99.0, 110.5];
    for (i, price) in prices.iter().enumerate() {
        exchange.set_price(*price).await;

        // Fill whatever the price crossed
        let crossed: Vec<String> = exchange
            .open_orders
            .lock()
            .await
            .iter()
            .filter(|o| match o.side {
                OrderSide::Buy => o.price >= *price,
                OrderSide::Sell => o.price <= *price,
            })
            .map(|o| o.order_id.clone())
            .collect();
        for id in crossed {
            exchange.fill_at_limit(&id).await;
        }

        match engine.tick(&exchange).await.unwrap() {
            TickOutcome::Continue(_) => {}
            TickOutcome::Halted(b) => panic!("tick {i} halted: {b}"),
        }

        assert!(engine.grid().check_exclusivity(), "tick {i}");
        for level in engine.grid().levels() {
            if level.state == LevelState::Long {
                assert!(level.buy_order.is_none(), "tick {i} level {}", level.index);
            }
            if let Some(order) = &level.buy_order {
                assert_eq!(engine.grid().find_level_by_order(&order.order_id), Some(level.index));
            }
        }
        // The index and the levels agree on the tracked set
        let bound = engine.grid().levels().iter().filter(|l| l.has_open_order()).count();
        assert_eq!(bound, engine.grid().tracked_order_count());
    }

    let stats = engine.snapshot();
    assert!(stats.fill_counts.sells > 0);
    assert!(stats.total_profit > 0.0);
}

#[tokio::test]
async fn start_validates_and_rejects_duplicates() {
    let supervisor = SessionSupervisor::new(Arc::new(MockExchange::new(105.0)), TICK);

    let err = supervisor
        .start(GridConfig::new("BTCUSDT", 100.0, 110.0, 0, 1000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, GridError::InvalidRange { .. }));

    supervisor.start(scenario_config()).await.unwrap();
    assert!(matches!(
        supervisor.start(scenario_config()).await,
        Err(GridError::AlreadyRunning(_))
    ));

    supervisor.stop_all().await;
    assert!(supervisor.list().await.is_empty());
}

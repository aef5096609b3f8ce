//! Session supervision: one reconciliation loop per symbol

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::config::GridConfig;
use super::engine::{ReconciliationEngine, TickOutcome};
use super::errors::{GridError, GridResult};
use super::executor::GridExchange;
use super::stats::StatsSnapshot;
use super::types::{GridLevel, RunState};

/// Status of one session, taken between ticks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub symbol: String,
    pub state: RunState,
    pub last_price: Option<f64>,
    pub tracked_orders: usize,
    pub stats: StatsSnapshot,
    pub levels: Vec<GridLevel>,
}

impl SessionStatus {
    fn of(engine: &ReconciliationEngine) -> Self {
        Self {
            symbol: engine.symbol().to_string(),
            state: engine.run_state(),
            last_price: engine.last_price(),
            tracked_orders: engine.grid().tracked_order_count(),
            stats: engine.snapshot(),
            levels: engine.grid().levels().to_vec(),
        }
    }
}

/// A running grid: its engine, its stop signal and its loop task.
///
/// `state` mirrors the engine's run state so the registry can be checked
/// without waiting on a tick that holds the engine lock.
struct Session {
    engine: Arc<Mutex<ReconciliationEngine>>,
    state: watch::Sender<RunState>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn is_active(&self) -> bool {
        self.state.borrow().is_active()
    }

    /// Move an active session to `Stopping`; false if it was not active
    fn claim_stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_active() {
                *state = RunState::Stopping;
                true
            } else {
                false
            }
        })
    }

    fn publish(&self, state: RunState) {
        self.state.send_replace(state);
    }

    async fn status(&self) -> SessionStatus {
        SessionStatus::of(&*self.engine.lock().await)
    }
}

/// Owns every session and the exchange client they share
pub struct SessionSupervisor<E: GridExchange + 'static> {
    exchange: Arc<E>,
    tick_interval: Duration,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl<E: GridExchange + 'static> SessionSupervisor<E> {
    pub fn new(exchange: Arc<E>, tick_interval: Duration) -> Self {
        Self {
            exchange,
            tick_interval,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn exchange(&self) -> &Arc<E> {
        &self.exchange
    }

    /// Validate `config`, build its grid and start the tick loop.
    ///
    /// Fails with `AlreadyRunning` if an active session owns the symbol.
    pub async fn start(&self, mut config: GridConfig) -> GridResult<SessionStatus> {
        config.validate()?;
        config.symbol = config.symbol.trim().to_uppercase();
        let symbol = config.symbol.clone();

        let existing = self.sessions.read().await.get(&symbol).cloned();
        if existing.is_some_and(|s| s.is_active()) {
            return Err(GridError::AlreadyRunning(symbol));
        }

        let precision = match config.precision {
            Some(precision) => precision,
            None => {
                let precision = self
                    .exchange
                    .get_symbol_precision(&symbol)
                    .await
                    .map_err(|source| GridError::ExchangeQuery {
                        symbol: symbol.clone(),
                        source,
                    })?;
                info!(
                    "[{}] resolved precision: price_decimals={}, quantity_decimals={}",
                    symbol, precision.price_decimals, precision.quantity_decimals
                );
                precision
            }
        };

        let recover = config.recover_open_orders;
        let mut engine = ReconciliationEngine::new(config, precision)?;
        if recover {
            match engine.recover_open_orders(self.exchange.as_ref()).await {
                Ok(0) => debug!("[{}] no resting orders to adopt", symbol),
                Ok(n) => info!("[{}] adopted {} resting orders", symbol, n),
                Err(e) => warn!("[{}] open-order recovery skipped: {}", symbol, e),
            }
        }
        engine.mark_running();

        let mut sessions = self.sessions.write().await;
        // Re-check: another start may have won the race while we were fetching
        if sessions.get(&symbol).is_some_and(|s| s.is_active()) {
            return Err(GridError::AlreadyRunning(symbol));
        }

        let status = SessionStatus::of(&engine);
        let (state, _) = watch::channel(engine.run_state());
        let (stop_tx, stop_rx) = watch::channel(false);
        let session = Arc::new(Session {
            engine: Arc::new(Mutex::new(engine)),
            state,
            stop_tx,
            task: Mutex::new(None),
        });
        let task = tokio::spawn(run_loop(
            self.exchange.clone(),
            session.clone(),
            stop_rx,
            self.tick_interval,
        ));
        *session.task.lock().await = Some(task);
        sessions.insert(symbol.clone(), session);

        info!(
            "[{}] session started: {} levels, tick every {:?}",
            symbol,
            status.levels.len(),
            self.tick_interval
        );
        Ok(status)
    }

    /// Signal the loop, wait for it to cancel outstanding orders, then drop the session
    pub async fn stop(&self, symbol: &str) -> GridResult<SessionStatus> {
        let key = symbol.trim().to_uppercase();
        let session = self
            .sessions
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| GridError::NotRunning(key.clone()))?;

        if !session.claim_stop() {
            return Err(GridError::NotRunning(key));
        }

        info!("[{}] stop requested", key);
        // Err only means the loop already exited
        let _ = session.stop_tx.send(true);

        if let Some(task) = session.task.lock().await.take() {
            if let Err(e) = task.await {
                error!("[{}] session task ended abnormally: {}", key, e);
            }
        }

        // The loop cancels on its way out; cover a loop that died first
        {
            let mut engine = session.engine.lock().await;
            if engine.run_state() != RunState::Stopped {
                engine.shutdown(self.exchange.as_ref()).await;
            }
            session.publish(engine.run_state());
        }

        let status = session.status().await;
        let mut sessions = self.sessions.write().await;
        if sessions.get(&key).is_some_and(|s| Arc::ptr_eq(s, &session)) {
            sessions.remove(&key);
        }
        Ok(status)
    }

    pub async fn status(&self, symbol: &str) -> GridResult<SessionStatus> {
        let key = symbol.trim().to_uppercase();
        let session = self
            .sessions
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(GridError::SessionNotFound(key))?;
        Ok(session.status().await)
    }

    /// Status of every registered session, sorted by symbol
    pub async fn list(&self) -> Vec<SessionStatus> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(sessions.len());
        for session in sessions {
            statuses.push(session.status().await);
        }
        statuses.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        statuses
    }

    /// Stop every active session
    pub async fn stop_all(&self) -> Vec<SessionStatus> {
        let symbols: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        let mut stopped = Vec::new();
        for symbol in symbols {
            match self.stop(&symbol).await {
                Ok(status) => stopped.push(status),
                Err(GridError::NotRunning(_)) => {}
                Err(e) => error!("[{}] stop failed: {}", symbol, e),
            }
        }
        stopped
    }
}

async fn run_loop<E>(
    exchange: Arc<E>,
    session: Arc<Session>,
    mut stop_rx: watch::Receiver<bool>,
    tick_interval: Duration,
) where
    E: GridExchange + 'static,
{
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                let mut engine = session.engine.lock().await;
                match engine.tick(exchange.as_ref()).await {
                    Ok(TickOutcome::Continue(_)) => {}
                    Ok(TickOutcome::Halted(breach)) => {
                        error!("[{}] halted by risk guard: {}", engine.symbol(), breach);
                        session.publish(engine.run_state());
                        return;
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Tick aborted, retrying next interval: {}", e);
                    }
                    Err(GridError::NotRunning(_)) => {
                        session.publish(engine.run_state());
                        return;
                    }
                    Err(e) => error!("Tick failed: {}", e),
                }
            }
        }
    }

    let mut engine = session.engine.lock().await;
    engine.shutdown(exchange.as_ref()).await;
    session.publish(engine.run_state());
}

use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};

use crate::bitget::BitgetClient;
use crate::config::{ConfigError, Settings};
use crate::grid::{GridConfig, SessionSupervisor};
use crate::server;

/// Boots the supervisor from a settings file and runs until ctrl-c
pub struct BotRunner {
    config: Settings,
}

impl BotRunner {
    /// Create a new runner from a configuration file
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = config_path.as_ref().to_string_lossy();
        let config = Settings::new(&path)?;
        Ok(Self { config })
    }

    /// Add a grid on top of the ones listed in the settings
    pub fn with_session(mut self, grid: GridConfig) -> Self {
        self.config.sessions.push(grid);
        self
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", &self.config.log.level);
        }
        env_logger::try_init().ok();

        info!("Starting grid bot...");

        let exchange = &self.config.exchange;
        let client = BitgetClient::new(
            exchange.base_url.clone(),
            exchange.credentials(),
            Some(exchange.timeout()),
        )?;
        info!("Exchange endpoint: {}", client.base_url());

        let supervisor = Arc::new(SessionSupervisor::new(
            Arc::new(client),
            self.config.engine.tick_interval(),
        ));

        for grid in self.config.sessions {
            let symbol = grid.symbol.clone();
            match supervisor.start(grid).await {
                Ok(status) => info!(
                    "[{}] running with {} levels, {} orders adopted",
                    status.symbol,
                    status.levels.len(),
                    status.tracked_orders
                ),
                Err(e) => error!("[{}] failed to start: {}", symbol, e),
            }
        }

        if self.config.server.enabled {
            let server_supervisor = supervisor.clone();
            let host = self.config.server.host.clone();
            let port = self.config.server.port;
            tokio::spawn(async move {
                if let Err(e) = server::start_server(server_supervisor, &host, port).await {
                    error!("Control server failed: {}", e);
                }
            });
        } else if supervisor.list().await.is_empty() {
            warn!("No sessions running and the control server is disabled");
        }

        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested, stopping all sessions...");

        for status in supervisor.stop_all().await {
            info!(
                "[{}] final: profit {:.4}, position {:.8}, buys {}, sells {}",
                status.symbol,
                status.stats.total_profit,
                status.stats.position_size,
                status.stats.fill_counts.buys,
                status.stats.fill_counts.sells
            );
        }

        Ok(())
    }
}

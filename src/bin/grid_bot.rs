//! Grid Trading Bot Binary
//!
//! Runs one reconciliation loop per configured symbol against Bitget spot.
//!
//! ## Setup
//!
//! 1. Copy `config.example.toml` to `config.toml` and fill in the grids.
//!    Credentials may instead come from a `.env` file:
//!    ```
//!    APP_EXCHANGE__API_KEY=...
//!    APP_EXCHANGE__API_SECRET=...
//!    APP_EXCHANGE__PASSPHRASE=...
//!    ```
//!
//! 2. Run the bot:
//!    ```bash
//!    cargo run --bin grid_bot -- config.toml [--grid extra_grid.json]
//!    ```

use std::env;

use spot_grid_bot::{grid::GridConfig, runner::BotRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let default_config = "config.toml".to_string();
    let config_path = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .unwrap_or(&default_config);
    if !std::path::Path::new(config_path).exists() {
        eprintln!("Config file '{}' not found. Please create one.", config_path);
        std::process::exit(1);
    }

    let mut runner = BotRunner::new(config_path)?;

    if let Some(pos) = args.iter().position(|a| a == "--grid") {
        let Some(grid_path) = args.get(pos + 1) else {
            eprintln!("--grid needs a path to a JSON grid config");
            std::process::exit(1);
        };
        runner = runner.with_session(GridConfig::load_from_file(grid_path)?);
    }

    if let Some(path) = env_file {
        eprintln!("Loaded environment from: {}", path.display());
    }

    if let Err(e) = runner.run().await {
        eprintln!("Bot execution error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

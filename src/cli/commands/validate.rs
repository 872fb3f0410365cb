//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use fx_config::load_config;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match load_config(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("API: {} (timeout {}s)", config.api.base_url, config.api.timeout_secs);
            println!("Instruments: {}", config.feed.instruments.join(", "));
            println!("Poll interval: {}s", config.feed.poll_interval_secs);
            println!("Decision interval: {}s", config.engine.decision_interval_secs);
            println!("Trade mode: {}", config.engine.trade_mode);
            println!("Strategy: {}", config.strategy.name);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

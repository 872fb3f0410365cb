//! Configuration management.

mod settings;

pub use settings::{
    ApiSettings, AppConfig, AppSettings, EngineSettings, FeedSettings, HistorySettings,
    LoggingConfig, StrategySettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment, then validate it.
///
/// Environment variables use the `FX` prefix with `__` between path
/// segments, e.g. `FX__ENGINE__TRADE_MODE=live`. `FX__FEED__INSTRUMENTS`
/// takes a comma-separated list.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("FX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("feed.instruments"),
        )
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

//! Configuration structures.

use config::ConfigError;
use fx_core::error::DataError;
use fx_core::types::{Instrument, TradeMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
}

impl AppConfig {
    /// Check invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.poll_interval_secs == 0 {
            return Err(invalid("feed.poll_interval_secs must be greater than 0"));
        }
        if self.feed.stop_timeout_secs == 0 {
            return Err(invalid("feed.stop_timeout_secs must be greater than 0"));
        }
        if self.engine.decision_interval_secs == 0 {
            return Err(invalid("engine.decision_interval_secs must be greater than 0"));
        }
        if self.api.timeout_secs == 0 {
            return Err(invalid("api.timeout_secs must be greater than 0"));
        }
        if self.history.initial_lookback_days == 0 {
            return Err(invalid("history.initial_lookback_days must be greater than 0"));
        }

        let instruments = self
            .feed
            .instruments()
            .map_err(|e| invalid(&format!("feed.instruments: {}", e)))?;
        if instruments.is_empty() {
            return Err(invalid("feed.instruments must not be empty"));
        }

        if !self.strategy.params.is_null() && !self.strategy.params.is_object() {
            return Err(invalid("strategy.params must be a table"));
        }
        Ok(())
    }

    /// The configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Foreign(Box::new(e)))
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "fx-trader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Quote and trade API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Key used when the variable named by `api_key_env` is unset
    pub api_key: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl ApiSettings {
    /// API key from the environment, falling back to the configured one.
    pub fn resolved_api_key(&self) -> String {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| self.api_key.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com".to_string(),
            api_key: "demo".to_string(),
            api_key_env: "FX_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Real-time quote feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub instruments: Vec<String>,
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub stop_timeout_secs: u64,
    /// Daily snapshot journal directory; journaling is off when unset
    pub journal_dir: Option<PathBuf>,
}

impl FeedSettings {
    pub fn instruments(&self) -> Result<Vec<Instrument>, DataError> {
        self.instruments.iter().map(|key| key.parse()).collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            instruments: ["EUR/USD", "USD/JPY", "GBP/USD", "USD/CHF", "USD/CAD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            poll_interval_secs: 60,
            error_backoff_secs: 5,
            stop_timeout_secs: 2,
            journal_dir: Some(PathBuf::from("data/realtime")),
        }
    }
}

/// Historical series store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub data_dir: PathBuf,
    pub initial_lookback_days: i64,
    pub freshness_days: i64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/historical"),
            initial_lookback_days: 5 * 365,
            freshness_days: 1,
        }
    }
}

/// Decision loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub decision_interval_secs: u64,
    pub trade_mode: TradeMode,
}

impl EngineSettings {
    pub fn decision_interval(&self) -> Duration {
        Duration::from_secs(self.decision_interval_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            decision_interval_secs: 300,
            trade_mode: TradeMode::Simulate,
        }
    }
}

/// Strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Registry name
    pub name: String,
    /// Merged over the strategy's default parameters
    pub params: serde_json::Value,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: "threshold".to_string(),
            params: serde_json::json!({
                "instrument": "USD/JPY",
                "threshold_percent": 0.5,
                "amount": 1000,
            }),
        }
    }
}

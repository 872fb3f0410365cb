//! Strategy registry for building strategies from configuration.

use crate::{DivergenceConfig, DivergenceStrategy, ThresholdConfig, ThresholdStrategy};
use fx_core::{error::StrategyError, traits::Strategy};
use fx_data::HistoricalSeriesStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub key: String,
    /// Strategy name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Whether the strategy reads the historical series store
    pub uses_history: bool,
    /// Default configuration as JSON
    pub default_config: serde_json::Value,
}

/// Registry for available strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let mut strategies = BTreeMap::new();

        strategies.insert(
            "threshold".to_string(),
            StrategyInfo {
                key: "threshold".to_string(),
                name: "Threshold".to_string(),
                description: "Buys after a drop and sells after a rise larger than a percent threshold"
                    .to_string(),
                uses_history: false,
                default_config: serde_json::to_value(ThresholdConfig::default()).unwrap_or_default(),
            },
        );

        strategies.insert(
            "divergence".to_string(),
            StrategyInfo {
                key: "divergence".to_string(),
                name: "Divergence".to_string(),
                description: "Trades a primary pair back towards correlated partners it has diverged from"
                    .to_string(),
                uses_history: true,
                default_config: serde_json::to_value(DivergenceConfig::default()).unwrap_or_default(),
            },
        );

        Self { strategies }
    }

    /// Map legacy names onto registry keys.
    fn canonical(name: &str) -> &str {
        match name {
            "simple" => "threshold",
            "correlation" => "divergence",
            other => other,
        }
    }

    /// List all available strategies.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(Self::canonical(name))
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all strategy names.
    pub fn names(&self) -> Vec<&String> {
        self.strategies.keys().collect()
    }

    /// Create a strategy instance from configuration.
    ///
    /// `params` is merged over the strategy's defaults, so a partial table
    /// only overrides what it names. `history` is called only by strategies
    /// that read historical series.
    pub fn create<F>(
        &self,
        name: &str,
        params: serde_json::Value,
        history: F,
    ) -> Result<Box<dyn Strategy>, StrategyError>
    where
        F: FnOnce() -> HistoricalSeriesStore,
    {
        let info = self
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        let params = merge_params(info.default_config.clone(), params);

        match info.key.as_str() {
            "threshold" => {
                let config: ThresholdConfig = serde_json::from_value(params)
                    .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
                Ok(Box::new(ThresholdStrategy::new(config)?))
            }
            "divergence" => {
                let config: DivergenceConfig = serde_json::from_value(params)
                    .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
                Ok(Box::new(DivergenceStrategy::new(config, history())?))
            }
            _ => Err(StrategyError::NotFound(name.to_string())),
        }
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay the keys of `overrides` onto `defaults`.
fn merge_params(defaults: serde_json::Value, overrides: serde_json::Value) -> serde_json::Value {
    match (defaults, overrides) {
        (serde_json::Value::Object(mut base), serde_json::Value::Object(extra)) => {
            base.extend(extra);
            serde_json::Value::Object(base)
        }
        (defaults, serde_json::Value::Null) => defaults,
        (_, overrides) => overrides,
    }
}

//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{Decision, Instrument, QuoteSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// State of a strategy for monitoring and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyState {
    /// Strategy name
    pub name: String,
    /// Number of snapshots evaluated
    pub decisions_made: usize,
    /// Number of trade decisions returned
    pub trades_signalled: usize,
    /// Current indicator values
    pub indicators: HashMap<String, f64>,
    /// Custom strategy-specific state
    pub custom: serde_json::Value,
}

impl Default for StrategyState {
    fn default() -> Self {
        Self {
            name: String::new(),
            decisions_made: 0,
            trades_signalled: 0,
            indicators: HashMap::new(),
            custom: serde_json::Value::Null,
        }
    }
}

/// Core strategy trait.
///
/// A strategy receives one quote snapshot per decision cycle and answers
/// with a [`Decision`]. Strategies may keep memory between calls; they are
/// driven sequentially, never concurrently.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Evaluate a snapshot.
    ///
    /// # Returns
    /// * `Ok(Decision::Trade { .. })` if a trade should be made
    /// * `Ok(Decision::NoTrade)` otherwise
    /// * `Err(_)` if evaluation itself failed
    async fn decide(&mut self, snapshot: &QuoteSnapshot) -> Result<Decision, StrategyError>;

    /// Get the current strategy state for monitoring.
    fn state(&self) -> StrategyState;

    /// Instruments this strategy needs quotes for.
    fn instruments(&self) -> Vec<Instrument>;

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct CountingStrategy {
        seen: usize,
    }

    #[async_trait]
    impl Strategy for CountingStrategy {
        fn name(&self) -> &str {
            "counting"
        }

        async fn decide(&mut self, _snapshot: &QuoteSnapshot) -> Result<Decision, StrategyError> {
            self.seen += 1;
            Ok(Decision::NoTrade)
        }

        fn state(&self) -> StrategyState {
            StrategyState {
                name: self.name().to_string(),
                decisions_made: self.seen,
                ..Default::default()
            }
        }

        fn instruments(&self) -> Vec<Instrument> {
            vec![]
        }
    }

    #[tokio::test]
    async fn test_boxed_strategy_keeps_state() {
        let mut strategy: Box<dyn Strategy> = Box::new(CountingStrategy { seen: 0 });
        let snapshot = QuoteSnapshot::empty(Utc::now());

        strategy.decide(&snapshot).await.unwrap();
        strategy.decide(&snapshot).await.unwrap();

        let state = strategy.state();
        assert_eq!(state.decisions_made, 2);
        assert_eq!(state.trades_signalled, 0);
        assert_eq!(strategy.description(), "");
    }
}

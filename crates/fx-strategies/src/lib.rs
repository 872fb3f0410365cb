//! Trading strategies.
//!
//! - Threshold: single-instrument reaction to large percent moves
//! - Divergence: mean reversion of a primary pair against correlated partners

mod divergence;
mod registry;
mod threshold;

pub use divergence::{divergence, divergence_action, DivergenceConfig, DivergenceStrategy};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use threshold::{ThresholdConfig, ThresholdStrategy};

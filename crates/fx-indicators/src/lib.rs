//! Rolling statistics over daily rate series.
//!
//! This crate provides the trailing-window analytics used by the history
//! store and the strategies:
//! - Simple moving average
//! - Sample standard deviation
//! - Pearson correlation between two date-aligned series

pub mod correlation;
pub mod moving_average;
pub mod volatility;

pub use correlation::{pearson, RollingCorrelation};
pub use moving_average::Sma;
pub use volatility::StdDev;

//! Core traits for the quote pipeline.

mod clock;
mod gateway;
mod indicator;
mod quote_source;
mod strategy;

pub use clock::{Clock, FixedClock, SystemClock};
pub use gateway::ExecutionGateway;
pub use indicator::{align_to_dates, Indicator, PairIndicator};
pub use quote_source::QuoteSource;
pub use strategy::{Strategy, StrategyConfig, StrategyState};

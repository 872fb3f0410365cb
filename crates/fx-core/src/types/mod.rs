//! Core data types for the quote pipeline.

mod instrument;
mod quote;
mod series;
mod trade;

pub use instrument::Instrument;
pub use quote::{Quote, QuoteSnapshot};
pub use series::{AnalyticPoint, PricePoint, TimeSeries};
pub use trade::{Decision, ExecutionReport, ExecutionStatus, Side, TradeIntent, TradeMode, TradeRecord};

//! Quote and trade API integrations.
//!
//! [`HttpFxClient`] talks to the quote/trade HTTP API and implements both
//! [`QuoteSource`](fx_core::traits::QuoteSource) and
//! [`ExecutionGateway`](fx_core::traits::ExecutionGateway).
//! [`PaperGateway`] simulates execution for demo runs.

mod http;
mod paper;

pub use http::{HttpConfig, HttpFxClient};
pub use paper::PaperGateway;

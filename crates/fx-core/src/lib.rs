//! Core types and traits for the currency quote pipeline.
//!
//! This crate provides the foundational building blocks including:
//! - Instruments, daily price series and quote snapshots
//! - Trade decisions, intents and execution outcomes
//! - The error taxonomy shared by every crate
//! - Traits for quote sources, execution gateways, strategies, indicators and clocks

pub mod types;
pub mod traits;
pub mod error;

pub use error::PipelineError;
pub use types::*;
pub use traits::*;

//! Execution gateway trait definition.

use crate::error::ExecutionError;
use crate::types::{ExecutionReport, TradeIntent};
use async_trait::async_trait;

/// Venue-facing side of the pipeline.
///
/// Gateways forward trade intents to a venue (or simulate doing so) and
/// own the connection they use to do it.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit a trade intent.
    ///
    /// A report with `success == false` is a venue rejection; transport
    /// failures are returned as errors.
    async fn execute(&self, intent: &TradeIntent) -> Result<ExecutionReport, ExecutionError>;

    /// Release the gateway connection. Calling it again is a no-op.
    async fn close(&self) -> Result<(), ExecutionError>;

    /// Get the gateway name.
    fn name(&self) -> &str;
}

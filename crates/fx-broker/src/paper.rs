//! Paper execution gateway for demo and simulation runs.

use async_trait::async_trait;
use fx_core::error::ExecutionError;
use fx_core::traits::ExecutionGateway;
use fx_core::types::{ExecutionReport, TradeIntent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

/// Gateway that accepts every trade without contacting a venue.
///
/// Each accepted trade gets a synthetic `demo-<uuid>` transaction id. A
/// gateway built with [`PaperGateway::rejecting`] refuses every trade
/// instead, which is how venue rejections are exercised offline.
pub struct PaperGateway {
    executed: Mutex<Vec<TradeIntent>>,
    reject_with: Option<String>,
    closed: AtomicBool,
}

impl PaperGateway {
    /// Create a new paper gateway.
    pub fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            reject_with: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Gateway that rejects every trade with `reason`.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            reject_with: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Intents accepted so far, oldest first.
    pub fn executed(&self) -> Vec<TradeIntent> {
        self.executed.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn execute(&self, intent: &TradeIntent) -> Result<ExecutionReport, ExecutionError> {
        if self.is_closed() {
            return Err(ExecutionError::Closed);
        }
        if let Some(reason) = &self.reject_with {
            return Ok(ExecutionReport::rejected(reason.clone()));
        }

        let transaction_id = format!("demo-{}", Uuid::new_v4());
        info!(%transaction_id, %intent, "paper trade");
        self.executed.lock().push(intent.clone());
        Ok(ExecutionReport::accepted(transaction_id))
    }

    async fn close(&self) -> Result<(), ExecutionError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &str {
        "paper"
    }
}

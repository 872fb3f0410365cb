//! Trade decisions, intents and execution outcomes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Instrument;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Outcome of evaluating a strategy against one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NoTrade,
    Trade {
        action: Side,
        instrument: Instrument,
        amount: Decimal,
        price: f64,
        reason: String,
    },
}

impl Decision {
    pub fn is_trade(&self) -> bool {
        matches!(self, Decision::Trade { .. })
    }

    /// Side of the trade, if any.
    pub fn action(&self) -> Option<Side> {
        match self {
            Decision::Trade { action, .. } => Some(*action),
            Decision::NoTrade => None,
        }
    }

    /// Stamp a trade decision into an intent.
    pub fn into_intent(self, timestamp: DateTime<Utc>) -> Option<TradeIntent> {
        match self {
            Decision::NoTrade => None,
            Decision::Trade {
                action,
                instrument,
                amount,
                price,
                reason,
            } => Some(TradeIntent::new(action, instrument, amount, price, reason, timestamp)),
        }
    }
}

/// A trade the pipeline intends to make. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    action: Side,
    instrument: Instrument,
    amount: Decimal,
    price: f64,
    rationale: String,
    timestamp: DateTime<Utc>,
}

impl TradeIntent {
    pub fn new(
        action: Side,
        instrument: Instrument,
        amount: Decimal,
        price: f64,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            instrument,
            amount,
            price,
            rationale: rationale.into(),
            timestamp,
        }
    }

    pub fn action(&self) -> Side {
        self.action
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for TradeIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}",
            self.action, self.amount, self.instrument, self.price
        )
    }
}

/// Gateway response to an execution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn accepted(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error: Some(error.into()),
        }
    }
}

/// What happened to an intent after the decision was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Logged only; no gateway call was made.
    Simulated,
    /// Gateway accepted the trade.
    Executed { transaction_id: String },
    /// Gateway rejected the trade or the call failed. Not retried.
    Failed { error: String },
}

/// How trade decisions are carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    /// Log the intent only.
    #[default]
    #[serde(alias = "paper")]
    Simulate,
    /// Send the intent to the execution gateway.
    Live,
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeMode::Simulate => write!(f, "simulate"),
            TradeMode::Live => write!(f, "live"),
        }
    }
}

impl std::str::FromStr for TradeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulate" | "paper" => Ok(TradeMode::Simulate),
            "live" => Ok(TradeMode::Live),
            other => Err(format!("unknown trade mode '{}'", other)),
        }
    }
}

/// One entry of the append-only trade audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub intent: TradeIntent,
    pub status: ExecutionStatus,
}

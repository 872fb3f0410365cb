//! Single-instrument threshold strategy.
//!
//! Remembers the rate seen on the previous decision and trades against
//! large moves: a drop of at least `threshold_percent` buys, a rise of at
//! least `threshold_percent` sells.

use async_trait::async_trait;
use fx_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState},
    types::{Decision, Instrument, QuoteSnapshot, Side},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Span};

/// Configuration for the threshold strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Instrument to watch, `BASE/QUOTE`
    pub instrument: String,
    /// Minimum absolute percent change that triggers a trade
    pub threshold_percent: f64,
    /// Trade size
    pub amount: Decimal,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            instrument: "USD/JPY".to_string(),
            threshold_percent: 0.5,
            amount: Decimal::from(1000),
        }
    }
}

impl StrategyConfig for ThresholdConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        parse_instrument(&self.instrument)?;
        if !self.threshold_percent.is_finite() || self.threshold_percent <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Threshold percent must be a positive number".into(),
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Trade amount must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn parse_instrument(key: &str) -> Result<Instrument, StrategyError> {
    key.parse()
        .map_err(|e| StrategyError::InvalidConfig(format!("{}: {}", key, e)))
}

/// Threshold momentum strategy.
pub struct ThresholdStrategy {
    config: ThresholdConfig,
    instrument: Instrument,
    previous_rate: Option<f64>,
    last_change: Option<f64>,
    decisions_made: usize,
    trades_signalled: usize,
    span: Span,
}

impl ThresholdStrategy {
    /// Create a new threshold strategy.
    pub fn new(config: ThresholdConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let instrument = parse_instrument(&config.instrument)?;
        Ok(Self {
            span: info_span!("strategy", name = "threshold", %instrument),
            config,
            instrument,
            previous_rate: None,
            last_change: None,
            decisions_made: 0,
            trades_signalled: 0,
        })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Rate recorded on the previous decision, if any.
    pub fn previous_rate(&self) -> Option<f64> {
        self.previous_rate
    }

    /// Update parameters in place.
    ///
    /// Switching to another instrument forgets the recorded baseline, so
    /// the next decision for the new instrument only records a rate.
    pub fn set_parameters(
        &mut self,
        instrument: Option<&str>,
        threshold_percent: Option<f64>,
        amount: Option<Decimal>,
    ) -> Result<(), StrategyError> {
        let mut config = self.config.clone();
        if let Some(instrument) = instrument {
            config.instrument = instrument.to_string();
        }
        if let Some(threshold_percent) = threshold_percent {
            config.threshold_percent = threshold_percent;
        }
        if let Some(amount) = amount {
            config.amount = amount;
        }
        config.validate()?;

        let instrument = parse_instrument(&config.instrument)?;
        if instrument != self.instrument {
            self.previous_rate = None;
            self.last_change = None;
            self.span = info_span!("strategy", name = "threshold", %instrument);
            self.instrument = instrument;
        }
        self.config = config;

        info!(
            parent: &self.span,
            threshold_percent = self.config.threshold_percent,
            amount = %self.config.amount,
            "parameters updated"
        );
        Ok(())
    }

    fn evaluate(&mut self, snapshot: &QuoteSnapshot) -> Decision {
        self.decisions_made += 1;

        let Some(current) = snapshot.rate(&self.instrument) else {
            warn!("no quote in snapshot");
            return Decision::NoTrade;
        };

        let Some(previous) = self.previous_rate.replace(current) else {
            info!(rate = current, "baseline recorded");
            return Decision::NoTrade;
        };

        let pct_change = (current - previous) / previous * 100.0;
        self.last_change = Some(pct_change);
        info!(previous, current, pct_change, "rate moved");

        let threshold = self.config.threshold_percent;
        let (action, reason) = if pct_change <= -threshold {
            (
                Side::Buy,
                format!(
                    "{} fell {:.2}%, beyond the {}% threshold",
                    self.instrument,
                    pct_change.abs(),
                    threshold
                ),
            )
        } else if pct_change >= threshold {
            (
                Side::Sell,
                format!(
                    "{} rose {:.2}%, beyond the {}% threshold",
                    self.instrument, pct_change, threshold
                ),
            )
        } else {
            debug!(pct_change, "change below threshold");
            return Decision::NoTrade;
        };

        self.trades_signalled += 1;
        info!(%action, price = current, "trade signalled");
        Decision::Trade {
            action,
            instrument: self.instrument.clone(),
            amount: self.config.amount,
            price: current,
            reason,
        }
    }
}

#[async_trait]
impl Strategy for ThresholdStrategy {
    fn name(&self) -> &str {
        "Threshold"
    }

    fn description(&self) -> &str {
        "Buys after a drop and sells after a rise larger than a percent threshold"
    }

    async fn decide(&mut self, snapshot: &QuoteSnapshot) -> Result<Decision, StrategyError> {
        let span = self.span.clone();
        Ok(span.in_scope(|| self.evaluate(snapshot)))
    }

    fn state(&self) -> StrategyState {
        let mut indicators = std::collections::HashMap::new();
        if let Some(rate) = self.previous_rate {
            indicators.insert("previous_rate".to_string(), rate);
        }
        if let Some(change) = self.last_change {
            indicators.insert("pct_change".to_string(), change);
        }

        StrategyState {
            name: self.name().to_string(),
            decisions_made: self.decisions_made,
            trades_signalled: self.trades_signalled,
            indicators,
            custom: serde_json::json!({
                "instrument": self.instrument.key(),
                "threshold_percent": self.config.threshold_percent,
                "amount": self.config.amount,
            }),
        }
    }

    fn instruments(&self) -> Vec<Instrument> {
        vec![self.instrument.clone()]
    }
}

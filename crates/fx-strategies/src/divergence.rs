//! Correlation divergence strategy.
//!
//! Compares today's move of a primary instrument with the moves of a set of
//! historically correlated secondaries. When the primary has run away from
//! a partner by more than a threshold, it trades the primary expecting the
//! pair to converge again.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use fx_core::{
    error::{DataError, StrategyError},
    traits::{Strategy, StrategyConfig, StrategyState},
    types::{Decision, Instrument, QuoteSnapshot, Side, TimeSeries},
};
use fx_data::{latest_correlation, HistoricalSeriesStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, info_span, warn, Instrument as _, Span};

use crate::threshold::parse_instrument;

/// Largest accepted correlation window, about ten years of daily closes.
pub const MAX_WINDOW: usize = 3650;

/// Configuration for the divergence strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceConfig {
    /// Instrument that is traded
    pub primary: String,
    /// Instruments the primary is compared against
    pub secondaries: Vec<String>,
    /// Correlation window in aligned daily points
    pub window: usize,
    /// Minimum absolute divergence that triggers a trade
    pub divergence_threshold: f64,
    /// Trade size
    pub amount: Decimal,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            primary: "EUR/USD".to_string(),
            secondaries: vec!["GBP/USD".to_string(), "AUD/USD".to_string()],
            window: 30,
            divergence_threshold: 1.5,
            amount: Decimal::from(1000),
        }
    }
}

impl StrategyConfig for DivergenceConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        let primary = parse_instrument(&self.primary)?;
        if self.secondaries.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one secondary instrument required".into(),
            ));
        }
        for secondary in &self.secondaries {
            if parse_instrument(secondary)? == primary {
                return Err(StrategyError::InvalidConfig(format!(
                    "{} cannot be its own secondary",
                    primary
                )));
            }
        }
        if !(2..=MAX_WINDOW).contains(&self.window) {
            return Err(StrategyError::InvalidConfig(format!(
                "Correlation window must be between 2 and {}",
                MAX_WINDOW
            )));
        }
        if !self.divergence_threshold.is_finite() || self.divergence_threshold < 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Divergence threshold must be a non-negative number".into(),
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

/// Sign with `sign(0) == 0`.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Divergence of the primary's move from a secondary's, oriented by their
/// correlation.
pub fn divergence(primary_change: f64, secondary_change: f64, correlation: f64) -> f64 {
    primary_change - secondary_change * sign(correlation)
}

/// Trade direction for the primary given correlation `c` and divergence `d`.
///
/// Positively correlated pairs should move together, so a primary that
/// outran its partner is sold; for non-positive correlation the rule flips.
pub fn divergence_action(correlation: f64, divergence: f64) -> Side {
    let sell = (correlation > 0.0 && divergence > 0.0) || (correlation <= 0.0 && divergence < 0.0);
    if sell {
        Side::Sell
    } else {
        Side::Buy
    }
}

/// Relative change from the series' previous close to `current`.
fn change_since_close(current: f64, series: &TimeSeries) -> Option<f64> {
    let previous = series.previous_close()?;
    Some((current - previous) / previous)
}

#[derive(Debug, Clone)]
struct Candidate {
    secondary: Instrument,
    correlation: f64,
    divergence: f64,
}

/// Correlation divergence strategy.
pub struct DivergenceStrategy {
    config: DivergenceConfig,
    primary: Instrument,
    secondaries: Vec<Instrument>,
    history: HistoricalSeriesStore,
    correlations: BTreeMap<Instrument, f64>,
    last_divergence: Option<f64>,
    decisions_made: usize,
    trades_signalled: usize,
    span: Span,
}

impl DivergenceStrategy {
    /// Create a new divergence strategy reading history from `history`.
    pub fn new(config: DivergenceConfig, history: HistoricalSeriesStore) -> Result<Self, StrategyError> {
        config.validate()?;
        let primary = parse_instrument(&config.primary)?;
        let secondaries = config
            .secondaries
            .iter()
            .map(|s| parse_instrument(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            span: info_span!("strategy", name = "divergence", %primary),
            config,
            primary,
            secondaries,
            history,
            correlations: BTreeMap::new(),
            last_divergence: None,
            decisions_made: 0,
            trades_signalled: 0,
        })
    }

    pub fn config(&self) -> &DivergenceConfig {
        &self.config
    }

    /// Latest correlation observed for each secondary.
    pub fn correlations(&self) -> &BTreeMap<Instrument, f64> {
        &self.correlations
    }

    /// Load the lookback range, treating "no data" as a skip.
    async fn load_history(
        &mut self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<TimeSeries>, StrategyError> {
        match self.history.load(instrument, Some(start), Some(end)).await {
            Ok(series) if series.is_empty() => {
                warn!(%instrument, %start, %end, "no history in lookback range");
                Ok(None)
            }
            Ok(series) => Ok(Some(series)),
            Err(DataError::Unavailable { cause, .. }) => {
                warn!(%instrument, operation = "load", error = %cause, "history unavailable");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn evaluate(&mut self, snapshot: &QuoteSnapshot) -> Result<Decision, StrategyError> {
        self.decisions_made += 1;

        let Some(primary_current) = snapshot.rate(&self.primary) else {
            warn!(instrument = %self.primary, "no quote for primary");
            return Ok(Decision::NoTrade);
        };
        let mut secondary_quotes = Vec::with_capacity(self.secondaries.len());
        for secondary in &self.secondaries {
            match snapshot.rate(secondary) {
                Some(rate) => secondary_quotes.push((secondary.clone(), rate)),
                None => {
                    warn!(instrument = %secondary, "no quote for secondary");
                    return Ok(Decision::NoTrade);
                }
            }
        }

        let window = self.config.window;
        let end = self.history.today();
        let start = i64::try_from(window)
            .ok()
            .and_then(|w| w.checked_mul(2))
            .and_then(Duration::try_days)
            .and_then(|lookback| end.checked_sub_signed(lookback))
            .ok_or_else(|| {
                StrategyError::InvalidConfig(format!("Window {} reaches before the calendar", window))
            })?;

        let primary = self.primary.clone();
        let Some(primary_series) = self.load_history(&primary, start, end).await? else {
            return Ok(Decision::NoTrade);
        };
        let Some(primary_change) = change_since_close(primary_current, &primary_series) else {
            return Ok(Decision::NoTrade);
        };

        let mut best: Option<Candidate> = None;
        for (secondary, secondary_current) in secondary_quotes {
            let Some(series) = self.load_history(&secondary, start, end).await? else {
                continue;
            };
            let Some(secondary_change) = change_since_close(secondary_current, &series) else {
                continue;
            };

            let correlation = latest_correlation(&primary_series, &series, window)?.unwrap_or(0.0);
            self.correlations.insert(secondary.clone(), correlation);

            let d = divergence(primary_change, secondary_change, correlation);
            debug!(
                %secondary,
                primary_change,
                secondary_change,
                correlation,
                divergence = d,
                "divergence computed"
            );

            let beats = match &best {
                Some(b) => d.abs() > b.divergence.abs(),
                None => d.abs() > 0.0,
            };
            if beats {
                best = Some(Candidate {
                    secondary,
                    correlation,
                    divergence: d,
                });
            }
        }

        self.last_divergence = best.as_ref().map(|b| b.divergence);

        let Some(best) = best.filter(|b| b.divergence.abs() > self.config.divergence_threshold) else {
            return Ok(Decision::NoTrade);
        };

        let action = divergence_action(best.correlation, best.divergence);
        let reason = format!(
            "{} diverged from {} by {:.4} (correlation {:.2}), beyond the {} threshold",
            self.primary,
            best.secondary,
            best.divergence,
            best.correlation,
            self.config.divergence_threshold
        );
        self.trades_signalled += 1;
        info!(%action, price = primary_current, %reason, "trade signalled");

        Ok(Decision::Trade {
            action,
            instrument: self.primary.clone(),
            amount: self.config.amount,
            price: primary_current,
            reason,
        })
    }
}

#[async_trait]
impl Strategy for DivergenceStrategy {
    fn name(&self) -> &str {
        "Divergence"
    }

    fn description(&self) -> &str {
        "Trades a primary pair back towards correlated partners it has diverged from"
    }

    async fn decide(&mut self, snapshot: &QuoteSnapshot) -> Result<Decision, StrategyError> {
        let span = self.span.clone();
        self.evaluate(snapshot).instrument(span).await
    }

    fn state(&self) -> StrategyState {
        let mut indicators: HashMap<String, f64> = self
            .correlations
            .iter()
            .map(|(secondary, c)| (format!("correlation:{}", secondary), *c))
            .collect();
        if let Some(d) = self.last_divergence {
            indicators.insert("divergence".to_string(), d);
        }

        StrategyState {
            name: self.name().to_string(),
            decisions_made: self.decisions_made,
            trades_signalled: self.trades_signalled,
            indicators,
            custom: serde_json::json!({
                "primary": self.primary.key(),
                "secondaries": self.secondaries.iter().map(Instrument::key).collect::<Vec<_>>(),
                "window": self.config.window,
                "divergence_threshold": self.config.divergence_threshold,
            }),
        }
    }

    fn instruments(&self) -> Vec<Instrument> {
        std::iter::once(self.primary.clone())
            .chain(self.secondaries.iter().cloned())
            .collect()
    }
}

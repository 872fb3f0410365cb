//! Real-time quotes and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Instrument;

/// Latest spot rate for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// The complete set of latest quotes published for one poll tick.
///
/// A snapshot is built once per tick and never patched afterwards; it
/// serializes as one journal record,
/// `{"timestamp": ..., "rates": {"EUR/USD": {"rate": ..., "timestamp": ...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub timestamp: DateTime<Utc>,
    rates: BTreeMap<Instrument, Quote>,
}

impl QuoteSnapshot {
    /// Snapshot with no quotes, used before the first tick completes.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            rates: BTreeMap::new(),
        }
    }

    /// Build a snapshot where every quote carries the snapshot timestamp.
    pub fn from_rates(
        timestamp: DateTime<Utc>,
        rates: impl IntoIterator<Item = (Instrument, f64)>,
    ) -> Self {
        let rates = rates
            .into_iter()
            .map(|(instrument, rate)| (instrument, Quote { rate, timestamp }))
            .collect();
        Self { timestamp, rates }
    }

    pub fn get(&self, instrument: &Instrument) -> Option<&Quote> {
        self.rates.get(instrument)
    }

    pub fn rate(&self, instrument: &Instrument) -> Option<f64> {
        self.rates.get(instrument).map(|q| q.rate)
    }

    pub fn contains(&self, instrument: &Instrument) -> bool {
        self.rates.contains_key(instrument)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.rates.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Instrument, &Quote)> {
        self.rates.iter()
    }
}

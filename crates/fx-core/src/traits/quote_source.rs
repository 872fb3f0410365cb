//! Quote source trait definition.

use crate::error::FetchError;
use crate::types::{Instrument, PricePoint};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Supplier of spot rates and daily rate history.
///
/// Implementations perform network I/O; every call may fail transiently
/// with a [`FetchError`]. Callers decide whether to retry.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the current spot rate for an instrument.
    ///
    /// # Returns
    /// * `Ok(Some(rate))` when the source quoted the instrument
    /// * `Ok(None)` when the source answered without a rate
    async fn current_rate(&self, instrument: &Instrument) -> Result<Option<f64>, FetchError>;

    /// Fetch daily rates for `[start, end]`.
    ///
    /// # Returns
    /// Points ordered from oldest to newest; may be empty.
    async fn historical_rates(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError>;

    /// Get the source name.
    fn name(&self) -> &str;
}

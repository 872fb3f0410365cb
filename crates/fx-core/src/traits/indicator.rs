//! Indicator trait definitions.

use crate::types::AnalyticPoint;
use chrono::NaiveDate;

/// Trailing-window statistic over one rate column.
///
/// `calculate` returns one value per full window, so the output is
/// `period() - 1` shorter than the input (empty when the input is shorter
/// than the window).
pub trait Indicator: Send + Sync {
    /// Calculate indicator values for the given data.
    fn calculate(&self, data: &[f64]) -> Vec<f64>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Calculate and attach values to their dates.
    ///
    /// The first `period() - 1` dates have no value.
    fn calculate_dated(&self, dates: &[NaiveDate], data: &[f64]) -> Vec<AnalyticPoint> {
        align_to_dates(dates, &self.calculate(data))
    }
}

/// Trailing-window statistic over two equally long, date-aligned columns.
pub trait PairIndicator: Send + Sync {
    /// Calculate values for aligned inputs.
    fn calculate_pair(&self, left: &[f64], right: &[f64]) -> Vec<f64>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Calculate and attach values to their dates.
    fn calculate_pair_dated(
        &self,
        dates: &[NaiveDate],
        left: &[f64],
        right: &[f64],
    ) -> Vec<AnalyticPoint> {
        align_to_dates(dates, &self.calculate_pair(left, right))
    }
}

/// Right-align window outputs with the dates they end on.
///
/// Non-finite values are reported as undefined.
pub fn align_to_dates(dates: &[NaiveDate], values: &[f64]) -> Vec<AnalyticPoint> {
    let offset = dates.len().saturating_sub(values.len());
    dates
        .iter()
        .enumerate()
        .map(|(i, date)| AnalyticPoint {
            date: *date,
            value: i
                .checked_sub(offset)
                .and_then(|j| values.get(j))
                .copied()
                .filter(|v| v.is_finite()),
        })
        .collect()
}

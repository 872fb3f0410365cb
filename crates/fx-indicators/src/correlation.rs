//! Rolling correlation between two aligned series.

use fx_core::error::IndicatorError;
use fx_core::traits::PairIndicator;

/// Rolling Pearson correlation.
///
/// Produces one value per full window of aligned observations. A window in
/// which either side is constant has no defined correlation and yields
/// `NaN`.
#[derive(Debug, Clone)]
pub struct RollingCorrelation {
    period: usize,
}

impl RollingCorrelation {
    /// Create a new rolling correlation over `period` points.
    pub fn new(period: usize) -> Self {
        assert!(period > 1, "Period must be greater than 1");
        Self { period }
    }

    /// Create a rolling correlation, rejecting windows under two points.
    pub fn try_new(period: usize) -> Result<Self, IndicatorError> {
        if period < 2 {
            return Err(IndicatorError::InvalidParameter(
                "correlation window must be at least 2".into(),
            ));
        }
        Ok(Self { period })
    }

    /// Latest defined value, if any.
    pub fn latest(&self, left: &[f64], right: &[f64]) -> Option<f64> {
        self.calculate_pair(left, right)
            .last()
            .copied()
            .filter(|c| c.is_finite())
    }
}

/// Pearson correlation of two equally long slices.
pub fn pearson(left: &[f64], right: &[f64]) -> f64 {
    let n = left.len().min(right.len());
    if n < 2 {
        return f64::NAN;
    }
    let (left, right) = (&left[..n], &right[..n]);

    let mean_l = left.iter().sum::<f64>() / n as f64;
    let mean_r = right.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_l = 0.0;
    let mut var_r = 0.0;
    for (l, r) in left.iter().zip(right) {
        let dl = l - mean_l;
        let dr = r - mean_r;
        cov += dl * dr;
        var_l += dl * dl;
        var_r += dr * dr;
    }

    let denom = (var_l * var_r).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

impl PairIndicator for RollingCorrelation {
    fn calculate_pair(&self, left: &[f64], right: &[f64]) -> Vec<f64> {
        let n = left.len().min(right.len());
        if n < self.period {
            return vec![];
        }

        (0..=n - self.period)
            .map(|start| {
                let end = start + self.period;
                pearson(&left[start..end], &right[start..end])
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "Correlation"
    }
}

//! Daily price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Instrument;

/// One daily observation of an instrument's rate.
///
/// Serialized as `{"date": "YYYY-MM-DD", "rate": number}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub rate: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, rate: f64) -> Self {
        Self { date, rate }
    }

    /// Rates must be finite and strictly positive.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.rate.is_finite() && self.rate > 0.0
    }
}

/// A value derived from a series at a given date.
///
/// `value` is `None` while the trailing window is not yet full, or when the
/// statistic is undefined (e.g. correlation over a constant window).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Per-instrument daily series keyed by unique date.
///
/// Dates are unique and iteration is always ascending by date; gaps are
/// allowed. A later write for an existing date replaces the earlier rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub instrument: Instrument,
    points: BTreeMap<NaiveDate, f64>,
}

impl TimeSeries {
    /// Create an empty series.
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            points: BTreeMap::new(),
        }
    }

    /// Build a series from points; for duplicated dates the last one wins.
    pub fn from_points(instrument: Instrument, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut series = Self::new(instrument);
        series.merge(points);
        series
    }

    /// Merge points into the series, keeping the newest value on duplicate
    /// dates. Returns how many dates were added or changed.
    pub fn merge(&mut self, points: impl IntoIterator<Item = PricePoint>) -> usize {
        let mut changed = 0;
        for point in points {
            match self.points.insert(point.date, point.rate) {
                Some(previous) if previous == point.rate => {}
                _ => changed += 1,
            }
        }
        changed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.keys().next_back().copied()
    }

    /// Most recent point.
    pub fn last(&self) -> Option<PricePoint> {
        self.points
            .iter()
            .next_back()
            .map(|(date, rate)| PricePoint::new(*date, *rate))
    }

    /// Rate on a given date.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    /// Prior close: the second-to-last rate, or the only rate when the
    /// series has a single point.
    pub fn previous_close(&self) -> Option<f64> {
        let mut rates = self.points.values().rev();
        let last = rates.next().copied()?;
        Some(rates.next().copied().unwrap_or(last))
    }

    /// Points in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.points
            .iter()
            .map(|(date, rate)| PricePoint::new(*date, *rate))
    }

    /// All points as a vector.
    pub fn points(&self) -> Vec<PricePoint> {
        self.iter().collect()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.keys().copied().collect()
    }

    /// Rate column in ascending date order.
    pub fn rates(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    /// Sub-series with dates in `[start, end]`; either bound may be open.
    pub fn range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> TimeSeries {
        let points = self
            .points
            .iter()
            .filter(|(date, _)| start.map_or(true, |s| **date >= s))
            .filter(|(date, _)| end.map_or(true, |e| **date <= e))
            .map(|(date, rate)| (*date, *rate))
            .collect();
        Self {
            instrument: self.instrument.clone(),
            points,
        }
    }

    /// Align two series on the dates present in both.
    ///
    /// Returns the shared dates and both rate columns, all in ascending
    /// date order and of equal length.
    pub fn align(&self, other: &TimeSeries) -> (Vec<NaiveDate>, Vec<f64>, Vec<f64>) {
        let mut dates = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        for (date, rate) in &self.points {
            if let Some(other_rate) = other.points.get(date) {
                dates.push(*date);
                left.push(*rate);
                right.push(*other_rate);
            }
        }
        (dates, left, right)
    }
}

//! Historical series store.
//!
//! Owns one daily [`TimeSeries`] per instrument, keeps it fresh by
//! fetching only the missing tail from a [`QuoteSource`], persists every
//! refresh, and exposes rolling analytics over the stored rates.
//!
//! The store is single-writer: every method takes `&mut self` and is meant
//! to be driven from one decision context. Sharing a store between
//! concurrent callers needs external synchronization.

use chrono::{Duration, NaiveDate};
use fx_core::error::{DataError, IndicatorError};
use fx_core::traits::{Clock, Indicator, PairIndicator, QuoteSource, SystemClock};
use fx_core::types::{AnalyticPoint, Instrument, TimeSeries};
use fx_indicators::{RollingCorrelation, Sma, StdDev};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument as _, Span};

use crate::cache::SeriesCache;

/// History store settings.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Directory holding one JSON file per instrument
    pub data_dir: PathBuf,
    /// Days fetched when an instrument has no cached data
    pub initial_lookback_days: i64,
    /// A series whose newest date is older than `today - freshness_days`
    /// is refreshed before use
    pub freshness_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/historical"),
            initial_lookback_days: 5 * 365,
            freshness_days: 1,
        }
    }
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    /// Requested range
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Points returned by the source
    pub fetched: usize,
    /// Dates added or whose rate changed
    pub changed: usize,
    /// Whether the merged series reached disk
    pub persisted: bool,
}

/// Historical series store.
pub struct HistoricalSeriesStore {
    source: Arc<dyn QuoteSource>,
    cache: SeriesCache,
    clock: Arc<dyn Clock>,
    config: HistoryConfig,
    span: Span,
}

impl HistoricalSeriesStore {
    /// Create a store reading and writing under `config.data_dir`.
    pub fn new(source: Arc<dyn QuoteSource>, config: HistoryConfig) -> Self {
        let span = info_span!("history", dir = %config.data_dir.display(), source = source.name());
        Self {
            cache: SeriesCache::new(config.data_dir.clone()),
            source,
            clock: Arc::new(SystemClock),
            config,
            span,
        }
    }

    /// Use a specific clock to decide what "today" is.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// The store's current calendar date.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Load an instrument's series filtered to `[start, end]`.
    ///
    /// Refreshes first when the cached series is stale. Fails with
    /// [`DataError::Unavailable`] only when nothing is cached and the
    /// refresh fetch failed; otherwise returns whatever is cached.
    pub async fn load(
        &mut self,
        instrument: &Instrument,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TimeSeries, DataError> {
        let span = self.span.clone();
        async move {
            let last = self.cached_or_empty(instrument).last_date();

            if self.is_stale(last) {
                match self.refresh(instrument).await {
                    Ok(outcome) => {
                        debug!(%instrument, fetched = outcome.fetched, changed = outcome.changed, "refreshed")
                    }
                    Err(DataError::Fetch(cause)) => {
                        if self.cached_or_empty(instrument).is_empty() {
                            return Err(DataError::Unavailable {
                                instrument: instrument.key(),
                                cause,
                            });
                        }
                        warn!(%instrument, operation = "refresh", error = %cause, "refresh failed, serving cached series");
                    }
                    Err(e) => return Err(e),
                }
            }

            Ok(self.cached_or_empty(instrument).range(start, end))
        }
        .instrument(span)
        .await
    }

    fn is_stale(&self, last: Option<NaiveDate>) -> bool {
        match last {
            None => true,
            Some(last) => last < self.clock.today() - Duration::days(self.config.freshness_days),
        }
    }

    /// Fetch the missing tail of an instrument's series and merge it in.
    ///
    /// An empty cache fetches `initial_lookback_days` ending today;
    /// otherwise only `[last_cached + 1, today]` is requested. Fetched rates
    /// replace cached ones on the same date. The merged series is written in
    /// full; a write failure is logged and the in-memory data is kept, so
    /// the next refresh tries again.
    pub async fn refresh(&mut self, instrument: &Instrument) -> Result<RefreshOutcome, DataError> {
        let today = self.clock.today();
        let start = match self.cached_or_empty(instrument).last_date() {
            Some(last) => last + Duration::days(1),
            None => today - Duration::days(self.config.initial_lookback_days),
        };

        if start > today {
            return Ok(RefreshOutcome {
                start,
                end: today,
                fetched: 0,
                changed: 0,
                persisted: true,
            });
        }

        info!(%instrument, %start, end = %today, "fetching history");
        let fetched = self.source.historical_rates(instrument, start, today).await?;
        let fetched_len = fetched.len();

        let (valid, invalid): (Vec<_>, Vec<_>) = fetched.into_iter().partition(|p| p.is_valid());
        if !invalid.is_empty() {
            warn!(%instrument, dropped = invalid.len(), "dropping non-positive or non-finite rates");
        }

        if valid.is_empty() {
            warn!(%instrument, %start, end = %today, "no new history returned");
            return Ok(RefreshOutcome {
                start,
                end: today,
                fetched: fetched_len,
                changed: 0,
                persisted: true,
            });
        }

        let changed = self.cache.entry(instrument).merge(valid);

        let persisted = match self.cache.save(instrument) {
            Ok(path) => {
                debug!(%instrument, path = %path.display(), "history saved");
                true
            }
            Err(e) => {
                warn!(%instrument, operation = "save", error = %e, "could not persist history; keeping it in memory");
                false
            }
        };

        Ok(RefreshOutcome {
            start,
            end: today,
            fetched: fetched_len,
            changed,
            persisted,
        })
    }

    /// Trailing simple moving average of the rate column.
    pub async fn moving_average(
        &mut self,
        instrument: &Instrument,
        window: usize,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AnalyticPoint>, DataError> {
        let sma = Sma::try_new(window)?;
        let series = self.load(instrument, start, end).await?;
        Ok(sma.calculate_dated(&series.dates(), &series.rates()))
    }

    /// Trailing sample standard deviation of the rate column.
    pub async fn volatility(
        &mut self,
        instrument: &Instrument,
        window: usize,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AnalyticPoint>, DataError> {
        let std = StdDev::try_sample(window)?;
        let series = self.load(instrument, start, end).await?;
        Ok(std.calculate_dated(&series.dates(), &series.rates()))
    }

    /// Trailing Pearson correlation between two instruments over the dates
    /// both series share.
    pub async fn correlation(
        &mut self,
        first: &Instrument,
        second: &Instrument,
        window: usize,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AnalyticPoint>, DataError> {
        RollingCorrelation::try_new(window)?;
        let a = self.load(first, start, end).await?;
        let b = self.load(second, start, end).await?;
        Ok(rolling_correlation(&a, &b, window)?)
    }

    /// Cached series without triggering I/O.
    pub fn cached(&self, instrument: &Instrument) -> Option<&TimeSeries> {
        self.cache.get(instrument)
    }

    /// Cached series, loading the file on first use.
    ///
    /// An unreadable file is treated as no history: an empty series is
    /// cached in its place and the next successful refresh overwrites the
    /// file.
    fn cached_or_empty(&mut self, instrument: &Instrument) -> &TimeSeries {
        if let Err(e) = self.cache.ensure_loaded(instrument) {
            warn!(%instrument, operation = "read", error = %e, "history file unreadable; starting from an empty series");
        }
        self.cache.entry(instrument)
    }
}

/// Rolling correlation of two series aligned on their shared dates.
///
/// Values are undefined until `window` aligned points exist.
pub fn rolling_correlation(
    a: &TimeSeries,
    b: &TimeSeries,
    window: usize,
) -> Result<Vec<AnalyticPoint>, IndicatorError> {
    let corr = RollingCorrelation::try_new(window)?;
    let (dates, left, right) = a.align(b);
    Ok(corr.calculate_pair_dated(&dates, &left, &right))
}

/// Latest defined correlation value, if any.
pub fn latest_correlation(
    a: &TimeSeries,
    b: &TimeSeries,
    window: usize,
) -> Result<Option<f64>, IndicatorError> {
    let corr = RollingCorrelation::try_new(window)?;
    let (_, left, right) = a.align(b);
    Ok(corr.latest(&left, &right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use fx_core::error::FetchError;
    use fx_core::traits::FixedClock;
    use fx_core::types::PricePoint;
    use parking_lot::Mutex;

    /// Scripted source: returns the points queued for an instrument and
    /// records every requested range.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<PricePoint>, FetchError>>>,
        requests: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl ScriptedSource {
        fn push(&self, response: Result<Vec<PricePoint>, FetchError>) {
            self.responses.lock().push(response);
        }

        fn requests(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn current_rate(&self, _instrument: &Instrument) -> Result<Option<f64>, FetchError> {
            Ok(None)
        }

        async fn historical_rates(
            &self,
            instrument: &Instrument,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PricePoint>, FetchError> {
            self.requests.lock().push((instrument.key(), start, end));
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(vec![])
            } else {
                responses.remove(0)
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn clock_on(date: NaiveDate) -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Utc.from_utc_datetime(&date.and_hms_opt(15, 30, 0).unwrap()),
        ))
    }

    fn store(dir: &std::path::Path, source: Arc<ScriptedSource>, today: NaiveDate) -> HistoricalSeriesStore {
        HistoricalSeriesStore::new(
            source,
            HistoryConfig {
                data_dir: dir.to_path_buf(),
                ..Default::default()
            },
        )
        .with_clock(clock_on(today))
    }

    fn pair() -> Instrument {
        "USD/JPY".parse().unwrap()
    }

    #[tokio::test]
    async fn test_initial_load_fetches_five_years() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        let today = d(2024, 6, 10);
        source.push(Ok(vec![
            PricePoint::new(d(2024, 6, 7), 156.0),
            PricePoint::new(d(2024, 6, 10), 157.0),
        ]));

        let mut store = store(dir.path(), source.clone(), today);
        let series = store.load(&pair(), None, None).await.unwrap();

        assert_eq!(series.len(), 2);
        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, today - Duration::days(5 * 365));
        assert_eq!(requests[0].2, today);
        assert!(dir.path().join("USD_JPY.json").exists());
    }

    #[tokio::test]
    async fn test_fresh_series_is_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(vec![PricePoint::new(d(2024, 6, 9), 156.0)]));

        let mut store = store(dir.path(), source.clone(), d(2024, 6, 10));
        store.load(&pair(), None, None).await.unwrap();
        store.load(&pair(), None, None).await.unwrap();

        // Newest date is yesterday, which is still fresh.
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_series_fetches_only_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(vec![PricePoint::new(d(2024, 6, 3), 155.0)]));

        let mut first = store(dir.path(), source.clone(), d(2024, 6, 3));
        first.load(&pair(), None, None).await.unwrap();

        source.push(Ok(vec![PricePoint::new(d(2024, 6, 10), 157.5)]));
        let mut later = store(dir.path(), source.clone(), d(2024, 6, 10));
        let series = later.load(&pair(), None, None).await.unwrap();

        let requests = source.requests();
        assert_eq!(requests[1].1, d(2024, 6, 4));
        assert_eq!(requests[1].2, d(2024, 6, 10));
        assert_eq!(series.rates(), vec![155.0, 157.5]);
    }

    #[tokio::test]
    async fn test_merge_keeps_newest_value_on_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        let today = d(2024, 6, 10);

        // Seed a file whose dates overlap with what the source will return.
        let mut seed = SeriesCache::new(dir.path().to_path_buf());
        seed.entry(&pair()).merge(vec![
            PricePoint::new(d(2024, 6, 1), 150.0),
            PricePoint::new(d(2024, 6, 2), 151.0),
        ]);
        seed.save(&pair()).unwrap();

        source.push(Ok(vec![
            PricePoint::new(d(2024, 6, 10), 160.0),
            PricePoint::new(d(2024, 6, 2), 152.5),
            PricePoint::new(d(2024, 6, 5), 155.0),
        ]));

        let mut store = store(dir.path(), source, today);
        let series = store.load(&pair(), None, None).await.unwrap();

        let dates = series.dates();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(series.get(d(2024, 6, 2)), Some(152.5));
        assert_eq!(series.len(), 4);

        // The file holds the full merged series.
        let mut reread = SeriesCache::new(dir.path().to_path_buf());
        assert_eq!(reread.ensure_loaded(&pair()).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unavailable_when_no_cache_and_fetch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Err(FetchError::Network("down".into())));

        let mut store = store(dir.path(), source, d(2024, 6, 10));
        let err = store.load(&pair(), None, None).await.unwrap_err();
        assert!(matches!(err, DataError::Unavailable { ref instrument, .. } if instrument == "USD/JPY"));
    }

    #[tokio::test]
    async fn test_stale_cache_served_when_fetch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(vec![PricePoint::new(d(2024, 6, 1), 150.0)]));

        let mut store = store(dir.path(), source.clone(), d(2024, 6, 1));
        store.load(&pair(), None, None).await.unwrap();

        source.push(Err(FetchError::Timeout(std::time::Duration::from_secs(10))));
        store.clock = clock_on(d(2024, 6, 20));
        let series = store.load(&pair(), None, None).await.unwrap();
        assert_eq!(series.rates(), vec![150.0]);
    }

    #[tokio::test]
    async fn test_empty_fetch_with_no_cache_returns_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());

        let mut store = store(dir.path(), source, d(2024, 6, 10));
        let series = store.load(&pair(), None, None).await.unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_load_filters_range() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok((1..=9)
            .map(|day| PricePoint::new(d(2024, 6, day), 150.0 + day as f64))
            .collect()));

        let mut store = store(dir.path(), source, d(2024, 6, 9));
        let series = store
            .load(&pair(), Some(d(2024, 6, 3)), Some(d(2024, 6, 5)))
            .await
            .unwrap();
        assert_eq!(series.rates(), vec![153.0, 154.0, 155.0]);
    }

    #[tokio::test]
    async fn test_invalid_rates_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(vec![
            PricePoint::new(d(2024, 6, 8), -1.0),
            PricePoint::new(d(2024, 6, 9), f64::NAN),
            PricePoint::new(d(2024, 6, 10), 157.0),
        ]));

        let mut store = store(dir.path(), source, d(2024, 6, 10));
        let series = store.load(&pair(), None, None).await.unwrap();
        assert_eq!(series.rates(), vec![157.0]);
    }

    #[tokio::test]
    async fn test_analytics_windowing() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok((1..=5)
            .map(|day| PricePoint::new(d(2024, 6, day), day as f64))
            .collect()));

        let mut store = store(dir.path(), source, d(2024, 6, 5));

        let ma = store.moving_average(&pair(), 3, None, None).await.unwrap();
        assert_eq!(ma.len(), 5);
        assert_eq!(ma[1].value, None);
        assert_eq!(ma[2].value, Some(2.0));
        assert_eq!(ma[4].value, Some(4.0));

        let vol = store.volatility(&pair(), 3, None, None).await.unwrap();
        assert_eq!(vol[1].value, None);
        assert!((vol[4].value.unwrap() - 1.0).abs() < 1e-12);

        assert!(store.volatility(&pair(), 1, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_correlation_uses_shared_dates() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::default());
        let eur: Instrument = "EUR/USD".parse().unwrap();
        let gbp: Instrument = "GBP/USD".parse().unwrap();

        source.push(Ok(vec![
            PricePoint::new(d(2024, 6, 1), 1.0),
            PricePoint::new(d(2024, 6, 2), 2.0),
            PricePoint::new(d(2024, 6, 3), 3.0),
            PricePoint::new(d(2024, 6, 4), 4.0),
        ]));
        source.push(Ok(vec![
            PricePoint::new(d(2024, 6, 2), 20.0),
            PricePoint::new(d(2024, 6, 3), 30.0),
            PricePoint::new(d(2024, 6, 4), 40.0),
        ]));

        let mut store = store(dir.path(), source, d(2024, 6, 4));
        let corr = store.correlation(&eur, &gbp, 3, None, None).await.unwrap();

        assert_eq!(corr.len(), 3);
        assert_eq!(corr[1].value, None);
        assert!((corr[2].value.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(corr[2].date, d(2024, 6, 4));
    }

    #[test]
    fn test_latest_correlation_skips_undefined_windows() {
        let series = |rates: [f64; 4]| {
            let points = rates
                .iter()
                .enumerate()
                .map(|(i, rate)| PricePoint::new(d(2024, 6, i as u32 + 1), *rate));
            TimeSeries::from_points(pair(), points)
        };
        let rising = series([1.0, 2.0, 3.0, 5.0]);
        let flat = series([2.0; 4]);

        assert!((latest_correlation(&rising, &rising, 3).unwrap().unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(latest_correlation(&rising, &flat, 3).unwrap(), None);
        assert_eq!(latest_correlation(&rising, &rising, 5).unwrap(), None);
        assert!(latest_correlation(&rising, &rising, 1).is_err());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_replaced_by_a_full_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("USD_JPY.json");
        std::fs::write(&path, b"{not json").unwrap();

        let source = Arc::new(ScriptedSource::default());
        let today = d(2024, 6, 10);
        source.push(Ok(vec![PricePoint::new(today, 157.0)]));

        let mut store = store(dir.path(), source.clone(), today);
        let series = store.load(&pair(), None, None).await.unwrap();

        assert_eq!(series.rates(), vec![157.0]);
        assert_eq!(source.requests()[0].1, today - Duration::days(5 * 365));

        let mut reread = SeriesCache::new(dir.path().to_path_buf());
        assert_eq!(reread.ensure_loaded(&pair()).unwrap().rates(), vec![157.0]);
    }
}

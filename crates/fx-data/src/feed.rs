//! Background quote poller.
//!
//! [`MarketDataFeed`] runs one task that fetches the current rate of every
//! configured instrument on a fixed cadence and publishes the results as a
//! fresh [`QuoteSnapshot`]. Readers get an `Arc` to the latest snapshot; the
//! lock guarding it is held only for the pointer swap.

use fx_core::error::{DataError, FetchError};
use fx_core::traits::{Clock, QuoteSource, SystemClock};
use fx_core::types::{Instrument, QuoteSnapshot};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument as _, Span};

use crate::journal::Journal;

/// Feed settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub instruments: Vec<Instrument>,
    pub poll_interval: Duration,
    /// Delay before the next tick after a failed one
    pub error_backoff: Duration,
    /// How long `stop` waits for the poller to exit
    pub stop_timeout: Duration,
}

impl FeedConfig {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self {
            instruments,
            poll_interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

/// Outcome of one poll tick.
#[derive(Debug, Clone)]
pub struct PollReport {
    /// The snapshot published by this tick
    pub snapshot: Arc<QuoteSnapshot>,
    /// Instruments whose fetch failed
    pub failed: Vec<(Instrument, FetchError)>,
    /// Instruments the source had no rate for
    pub missing: Vec<Instrument>,
}

impl PollReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }
}

struct FeedShared {
    source: Arc<dyn QuoteSource>,
    journal: Option<Journal>,
    clock: Arc<dyn Clock>,
    config: FeedConfig,
    latest: Mutex<Arc<QuoteSnapshot>>,
    span: Span,
}

impl FeedShared {
    async fn poll_once(&self) -> Result<PollReport, DataError> {
        let fetches = self
            .config
            .instruments
            .iter()
            .map(|instrument| async move { (instrument, self.source.current_rate(instrument).await) });
        let results = join_all(fetches).await;

        let mut rates = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        let mut missing = Vec::new();
        for (instrument, result) in results {
            match result {
                Ok(Some(rate)) if rate.is_finite() && rate > 0.0 => rates.push((instrument.clone(), rate)),
                Ok(Some(rate)) => {
                    warn!(%instrument, rate, "discarding invalid rate");
                    missing.push(instrument.clone());
                }
                Ok(None) => missing.push(instrument.clone()),
                Err(e) => failed.push((instrument.clone(), e)),
            }
        }

        let snapshot = Arc::new(QuoteSnapshot::from_rates(self.clock.time(), rates));
        *self.latest.lock() = Arc::clone(&snapshot);
        debug!(quotes = snapshot.len(), failed = failed.len(), "snapshot published");

        if let Some(journal) = &self.journal {
            journal.append(&snapshot)?;
        }

        Ok(PollReport {
            snapshot,
            failed,
            missing,
        })
    }

    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        info!(
            instruments = self.config.instruments.len(),
            interval_secs = self.config.poll_interval.as_secs_f64(),
            "feed started"
        );

        loop {
            let tick = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                tick = self.poll_once() => tick,
            };

            let delay = match tick {
                Ok(report) if report.failed.is_empty() => self.config.poll_interval,
                Ok(report) => {
                    for (instrument, e) in &report.failed {
                        warn!(%instrument, operation = "current_rate", error = %e, "quote fetch failed");
                    }
                    self.config.error_backoff
                }
                Err(e) => {
                    error!(operation = "journal", error = %e, "tick abandoned");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("feed stopped");
    }
}

/// Dropping `stop_tx` also ends the poller, so dropping the feed stops it.
struct Worker {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

/// Periodic quote poller publishing whole snapshots.
pub struct MarketDataFeed {
    shared: Arc<FeedShared>,
    worker: Option<Worker>,
}

impl MarketDataFeed {
    pub fn new(source: Arc<dyn QuoteSource>, config: FeedConfig) -> Self {
        Self::build(source, config, None, Arc::new(SystemClock))
    }

    /// Feed that appends every published snapshot to `journal`.
    pub fn with_journal(source: Arc<dyn QuoteSource>, config: FeedConfig, journal: Journal) -> Self {
        Self::build(source, config, Some(journal), Arc::new(SystemClock))
    }

    /// Replace the clock used to timestamp snapshots.
    ///
    /// The poller task shares the feed state from `start` until it has
    /// exited, so while it is alive the clock cannot be swapped: the call
    /// logs a warning and returns the feed unchanged.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let shared = match Arc::try_unwrap(self.shared) {
            Ok(shared) => shared,
            Err(shared) => {
                warn!(parent: &shared.span, "clock not replaced while the poller is running");
                return Self { shared, worker: self.worker };
            }
        };
        Self::build(shared.source, shared.config, shared.journal, clock)
    }

    fn build(
        source: Arc<dyn QuoteSource>,
        config: FeedConfig,
        journal: Option<Journal>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let span = info_span!("feed", source = source.name());
        let empty = Arc::new(QuoteSnapshot::empty(clock.time()));
        Self {
            shared: Arc::new(FeedShared {
                source,
                journal,
                clock,
                config,
                latest: Mutex::new(empty),
                span,
            }),
            worker: None,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.shared.config
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<QuoteSnapshot> {
        Arc::clone(&self.shared.latest.lock())
    }

    /// Rate for one instrument from the latest snapshot.
    pub fn latest_rate(&self, instrument: &Instrument) -> Option<f64> {
        self.shared.latest.lock().rate(instrument)
    }

    /// Run a single tick on the caller's task.
    ///
    /// The snapshot is published even when journaling fails; the journal
    /// error is then returned.
    pub async fn poll_once(&self) -> Result<PollReport, DataError> {
        self.shared
            .poll_once()
            .instrument(self.shared.span.clone())
            .await
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Spawn the poller. The first tick runs immediately.
    ///
    /// Does nothing if the poller is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("feed already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let span = shared.span.clone();
        let handle = tokio::spawn(shared.run(stop_rx).instrument(span));
        self.worker = Some(Worker { handle, stop_tx });
    }

    /// Signal the poller to stop and wait up to `stop_timeout` for it.
    ///
    /// A poller that does not exit in time is aborted and
    /// [`DataError::FeedStopTimeout`] is returned.
    pub async fn stop(&mut self) -> Result<(), DataError> {
        let Some(mut worker) = self.worker.take() else {
            return Ok(());
        };

        let _ = worker.stop_tx.send(true);
        let timeout = self.shared.config.stop_timeout;

        match tokio::time::timeout(timeout, &mut worker.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                if e.is_panic() {
                    error!(parent: &self.shared.span, error = %e, "feed task panicked");
                }
                Ok(())
            }
            Err(_) => {
                worker.handle.abort();
                warn!(parent: &self.shared.span, ?timeout, "feed did not stop in time; aborted");
                Err(DataError::FeedStopTimeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use fx_core::traits::FixedClock;
    use fx_core::types::PricePoint;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedSource {
        rates: Mutex<HashMap<Instrument, Result<Option<f64>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn set(&self, instrument: &Instrument, result: Result<Option<f64>, FetchError>) {
            self.rates.lock().insert(instrument.clone(), result);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn current_rate(&self, instrument: &Instrument) -> Result<Option<f64>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .lock()
                .get(instrument)
                .cloned()
                .unwrap_or(Ok(None))
        }

        async fn historical_rates(
            &self,
            _instrument: &Instrument,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PricePoint>, FetchError> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Source whose fetch blocks its worker thread without yielding.
    struct StuckSource {
        entered: AtomicBool,
        block: Duration,
    }

    #[async_trait]
    impl QuoteSource for StuckSource {
        async fn current_rate(&self, _instrument: &Instrument) -> Result<Option<f64>, FetchError> {
            self.entered.store(true, Ordering::SeqCst);
            std::thread::sleep(self.block);
            Ok(Some(1.0))
        }

        async fn historical_rates(
            &self,
            _instrument: &Instrument,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PricePoint>, FetchError> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "stuck"
        }
    }

    async fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {what}");
    }

    fn pairs() -> (Instrument, Instrument) {
        ("EUR/USD".parse().unwrap(), "USD/JPY".parse().unwrap())
    }

    fn config() -> FeedConfig {
        let (eur, jpy) = pairs();
        FeedConfig {
            poll_interval: Duration::from_secs(3600),
            ..FeedConfig::new(vec![eur, jpy])
        }
    }

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()))
    }

    #[tokio::test]
    async fn test_snapshot_holds_only_this_ticks_successes() {
        let (eur, jpy) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Ok(Some(1.08)));
        source.set(&jpy, Ok(Some(157.2)));

        let feed = MarketDataFeed::new(source.clone(), config());
        let first = feed.poll_once().await.unwrap();
        assert_eq!(first.snapshot.len(), 2);
        assert!(first.is_complete());

        source.set(&jpy, Err(FetchError::Network("reset".into())));
        let second = feed.poll_once().await.unwrap();

        assert_eq!(second.snapshot.rate(&eur), Some(1.08));
        assert!(!second.snapshot.contains(&jpy));
        assert_eq!(second.failed.len(), 1);
        assert_eq!(feed.latest_rate(&jpy), None);
    }

    #[tokio::test]
    async fn test_absent_rate_is_reported_missing() {
        let (eur, jpy) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Ok(Some(1.08)));

        let feed = MarketDataFeed::new(source, config());
        let report = feed.poll_once().await.unwrap();
        assert_eq!(report.missing, vec![jpy]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_tick_is_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let (eur, _) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Ok(Some(1.08)));

        let journal = Journal::new(dir.path());
        let feed = MarketDataFeed::with_journal(source, config(), journal.clone()).with_clock(fixed_clock());
        feed.poll_once().await.unwrap();
        feed.poll_once().await.unwrap();

        let records = journal
            .read_day(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rate(&eur), Some(1.08));
    }

    #[tokio::test]
    async fn test_journal_failure_still_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let (eur, _) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Ok(Some(1.08)));

        let feed = MarketDataFeed::with_journal(source, config(), Journal::new(&blocker));
        let err = feed.poll_once().await.unwrap_err();
        assert!(matches!(err, DataError::Persistence(_)));
        assert_eq!(feed.latest_rate(&eur), Some(1.08));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_bounded() {
        let (eur, _) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Ok(Some(1.08)));

        let mut feed = MarketDataFeed::new(source, config());
        assert!(feed.latest().is_empty());

        feed.start();
        feed.start();
        assert!(feed.is_running());

        let published = tokio::time::timeout(Duration::from_secs(2), async {
            while feed.latest_rate(&eur).is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(published.is_ok());

        feed.stop().await.unwrap();
        assert!(!feed.is_running());
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_tick_retries_after_backoff() {
        let (eur, _) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Err(FetchError::Network("reset".into())));

        // The poll interval is an hour, so only the backoff can bring the next tick.
        let config = FeedConfig {
            poll_interval: Duration::from_secs(3600),
            error_backoff: Duration::from_millis(10),
            ..FeedConfig::new(vec![eur.clone()])
        };
        let mut feed = MarketDataFeed::new(source.clone(), config);
        feed.start();

        wait_for("the failed tick", || source.calls() >= 1).await;
        assert_eq!(feed.latest_rate(&eur), None);

        source.set(&eur, Ok(Some(1.09)));
        wait_for("the recovered rate", || feed.latest_rate(&eur).is_some()).await;

        assert_eq!(feed.latest_rate(&eur), Some(1.09));
        assert!(feed.is_running());
        feed.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stuck_poller_is_aborted_after_stop_timeout() {
        let (eur, _) = pairs();
        let source = Arc::new(StuckSource {
            entered: AtomicBool::new(false),
            block: Duration::from_millis(500),
        });
        let config = FeedConfig {
            stop_timeout: Duration::from_millis(50),
            ..FeedConfig::new(vec![eur])
        };
        let mut feed = MarketDataFeed::new(source.clone(), config);
        feed.start();

        wait_for("the fetch to block", || source.entered.load(Ordering::SeqCst)).await;

        let err = feed.stop().await.unwrap_err();
        assert!(matches!(err, DataError::FeedStopTimeout(t) if t == Duration::from_millis(50)));
        assert!(!feed.is_running());
    }

    #[tokio::test]
    async fn test_clock_is_kept_while_poller_runs() {
        let (eur, _) = pairs();
        let source = Arc::new(ScriptedSource::default());
        source.set(&eur, Ok(Some(1.08)));

        let mut feed = MarketDataFeed::new(source, config());
        feed.start();
        let mut feed = feed.with_clock(fixed_clock());
        assert!(feed.is_running());

        feed.stop().await.unwrap();
        let feed = feed.with_clock(fixed_clock());
        let report = feed.poll_once().await.unwrap();
        assert_eq!(report.snapshot.timestamp, fixed_clock().time());
    }
}

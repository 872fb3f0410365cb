//! Decision loop.
//!
//! Each cycle reads the feed's latest snapshot, asks the strategy for a
//! decision and, for a trade, records the intent in the audit log after
//! carrying it out according to the [`TradeMode`]. Cycles run strictly one
//! after another; errors inside a cycle are logged and reported, never
//! propagated out of [`DecisionLoop::run`].

use fx_core::error::{ExecutionError, PipelineError};
use fx_core::traits::{Clock, ExecutionGateway, Strategy, SystemClock};
use fx_core::types::{ExecutionStatus, TradeIntent, TradeMode, TradeRecord};
use fx_data::MarketDataFeed;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument as _, Span};

/// Decision loop settings.
#[derive(Debug, Clone)]
pub struct DecisionLoopConfig {
    pub mode: TradeMode,
    /// Pause between the end of one cycle and the start of the next
    pub decision_interval: Duration,
}

impl Default for DecisionLoopConfig {
    fn default() -> Self {
        Self {
            mode: TradeMode::Simulate,
            decision_interval: Duration::from_secs(300),
        }
    }
}

/// Result of one decision cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The strategy saw no opportunity.
    NoTrade,
    /// A trade intent was recorded and carried out.
    Traded(TradeRecord),
    /// The cycle failed. A trade the gateway rejected is still recorded.
    Failed(PipelineError),
}

impl CycleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub trades: u64,
}

/// Requests shutdown of a running [`DecisionLoop`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Orchestrates snapshot → decision → trade intent cycles.
pub struct DecisionLoop {
    feed: MarketDataFeed,
    strategy: Box<dyn Strategy>,
    gateway: Arc<dyn ExecutionGateway>,
    clock: Arc<dyn Clock>,
    config: DecisionLoopConfig,
    history: Vec<TradeRecord>,
    stats: LoopStats,
    shutdown_tx: Arc<watch::Sender<bool>>,
    closed: bool,
    span: Span,
}

impl DecisionLoop {
    pub fn new(
        feed: MarketDataFeed,
        strategy: Box<dyn Strategy>,
        gateway: Arc<dyn ExecutionGateway>,
        config: DecisionLoopConfig,
    ) -> Self {
        let span = info_span!(
            "decision_loop",
            strategy = strategy.name(),
            gateway = gateway.name(),
            mode = %config.mode
        );
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            feed,
            strategy,
            gateway,
            clock: Arc::new(SystemClock),
            config,
            history: Vec::new(),
            stats: LoopStats::default(),
            shutdown_tx: Arc::new(shutdown_tx),
            closed: false,
            span,
        }
    }

    /// Use a specific clock to timestamp intents.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &DecisionLoopConfig {
        &self.config
    }

    pub fn feed(&self) -> &MarketDataFeed {
        &self.feed
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    /// Every intent recorded so far, oldest first.
    pub fn trade_history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Run one decision cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let span = self.span.clone();
        let outcome = self.cycle().instrument(span).await;

        self.stats.cycles += 1;
        match &outcome {
            CycleOutcome::NoTrade => {}
            CycleOutcome::Traded(_) => self.stats.trades += 1,
            CycleOutcome::Failed(e) => {
                self.stats.failed_cycles += 1;
                error!(parent: &self.span, error = %e, "decision cycle failed");
            }
        }
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        if self.closed {
            return CycleOutcome::Failed(PipelineError::Internal(
                "decision loop is shut down".into(),
            ));
        }

        let snapshot = self.feed.latest();
        let decision = match self.strategy.decide(&snapshot).await {
            Ok(decision) => decision,
            Err(e) => return CycleOutcome::Failed(e.into()),
        };

        let Some(intent) = decision.into_intent(self.clock.time()) else {
            info!(quotes = snapshot.len(), "no trade opportunity");
            return CycleOutcome::NoTrade;
        };
        info!(%intent, reason = intent.rationale(), "trade decided");

        let (status, failure) = self.carry_out(&intent).await;
        let record = TradeRecord { intent, status };
        self.history.push(record.clone());

        match failure {
            Some(e) => CycleOutcome::Failed(e.into()),
            None => CycleOutcome::Traded(record),
        }
    }

    async fn carry_out(&self, intent: &TradeIntent) -> (ExecutionStatus, Option<ExecutionError>) {
        match self.config.mode {
            TradeMode::Simulate => {
                info!(%intent, "simulated trade");
                (ExecutionStatus::Simulated, None)
            }
            TradeMode::Live => match self.gateway.execute(intent).await {
                Ok(report) if report.success => {
                    let transaction_id = report.transaction_id.unwrap_or_default();
                    info!(%intent, %transaction_id, "trade executed");
                    (ExecutionStatus::Executed { transaction_id }, None)
                }
                Ok(report) => {
                    let error = report.error.unwrap_or_else(|| "rejected without reason".to_string());
                    warn!(%intent, %error, "trade rejected");
                    (
                        ExecutionStatus::Failed { error: error.clone() },
                        Some(ExecutionError::Rejected(error)),
                    )
                }
                Err(e) => {
                    warn!(%intent, error = %e, "trade execution failed");
                    (ExecutionStatus::Failed { error: e.to_string() }, Some(e))
                }
            },
        }
    }

    /// Start the feed and run cycles until shutdown is requested.
    ///
    /// A cycle in progress when shutdown is requested completes; no new
    /// cycle starts afterwards. The loop then shuts down the feed and the
    /// gateway. A loop that is already shut down returns its stats without
    /// restarting the feed.
    pub async fn run(&mut self) -> Result<LoopStats, PipelineError> {
        if self.closed {
            warn!(parent: &self.span, "decision loop already shut down");
            return Ok(self.stats);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.feed.start();
        info!(
            parent: &self.span,
            interval_secs = self.config.decision_interval.as_secs_f64(),
            "decision loop started"
        );

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(self.config.decision_interval) => {}
            }
        }

        self.shutdown().await?;
        Ok(self.stats)
    }

    /// Stop the feed and close the gateway.
    ///
    /// Calling it again is a no-op that succeeds. When both steps fail,
    /// the feed error is returned.
    pub async fn shutdown(&mut self) -> Result<(), PipelineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shutdown_tx.send_replace(true);
        info!(parent: &self.span, "shutting down");

        let feed = self.feed.stop().await;
        if let Err(e) = &feed {
            warn!(parent: &self.span, error = %e, "feed stop failed");
        }
        let gateway = self.gateway.close().await;
        if let Err(e) = &gateway {
            warn!(parent: &self.span, error = %e, "gateway close failed");
        }

        info!(parent: &self.span, stats = ?self.stats, trades = self.history.len(), "shut down");
        feed?;
        gateway?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use fx_broker::PaperGateway;
    use fx_core::error::{FetchError, StrategyError};
    use fx_core::traits::{FixedClock, QuoteSource, StrategyState};
    use fx_core::types::{Decision, Instrument, PricePoint, QuoteSnapshot, Side};
    use fx_data::FeedConfig;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;

    struct StaticSource;

    #[async_trait]
    impl QuoteSource for StaticSource {
        async fn current_rate(&self, _instrument: &Instrument) -> Result<Option<f64>, FetchError> {
            Ok(Some(1.1))
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
            "static"
        }
    }

    /// Strategy replaying a fixed script of results.
    struct ScriptedStrategy {
        script: VecDeque<Result<Decision, StrategyError>>,
    }

    impl ScriptedStrategy {
        fn new(script: Vec<Result<Decision, StrategyError>>) -> Box<dyn Strategy> {
            Box::new(Self {
                script: script.into(),
            })
        }
    }

    #[async_trait]
    impl Strategy for ScriptedStrategy {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn decide(&mut self, _snapshot: &QuoteSnapshot) -> Result<Decision, StrategyError> {
            self.script.pop_front().unwrap_or(Ok(Decision::NoTrade))
        }

        fn state(&self) -> StrategyState {
            StrategyState::default()
        }

        fn instruments(&self) -> Vec<Instrument> {
            vec![]
        }
    }

    fn trade(action: Side) -> Decision {
        Decision::Trade {
            action,
            instrument: "EUR/USD".parse().unwrap(),
            amount: dec!(1000),
            price: 1.1,
            reason: "scripted".into(),
        }
    }

    fn feed() -> MarketDataFeed {
        MarketDataFeed::new(
            Arc::new(StaticSource),
            FeedConfig::new(vec!["EUR/USD".parse().unwrap()]),
        )
    }

    fn decision_loop(
        script: Vec<Result<Decision, StrategyError>>,
        gateway: Arc<PaperGateway>,
        mode: TradeMode,
    ) -> DecisionLoop {
        DecisionLoop::new(
            feed(),
            ScriptedStrategy::new(script),
            gateway,
            DecisionLoopConfig {
                mode,
                decision_interval: Duration::from_millis(10),
            },
        )
        .with_clock(Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap())))
    }

    #[tokio::test]
    async fn test_no_trade_has_no_side_effect() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![Ok(Decision::NoTrade)], gateway.clone(), TradeMode::Live);

        assert!(matches!(dl.run_cycle().await, CycleOutcome::NoTrade));
        assert!(dl.trade_history().is_empty());
        assert!(gateway.executed().is_empty());
    }

    #[tokio::test]
    async fn test_simulate_mode_records_without_gateway() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![Ok(trade(Side::Buy))], gateway.clone(), TradeMode::Simulate);

        let outcome = dl.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Traded(TradeRecord { status: ExecutionStatus::Simulated, .. })
        ));
        assert!(gateway.executed().is_empty());

        let history = dl.trade_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].intent.action(), Side::Buy);
        assert_eq!(
            history[0].intent.timestamp(),
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_live_mode_executes_through_gateway() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![Ok(trade(Side::Sell))], gateway.clone(), TradeMode::Live);

        match dl.run_cycle().await {
            CycleOutcome::Traded(TradeRecord {
                status: ExecutionStatus::Executed { transaction_id },
                ..
            }) => assert!(transaction_id.starts_with("demo-")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(gateway.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_trade_is_recorded_and_cycle_fails() {
        let gateway = Arc::new(PaperGateway::rejecting("insufficient margin"));
        let mut dl = decision_loop(vec![Ok(trade(Side::Buy))], gateway, TradeMode::Live);

        let outcome = dl.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Failed(PipelineError::Execution(ExecutionError::Rejected(_)))
        ));
        assert_eq!(
            dl.trade_history()[0].status,
            ExecutionStatus::Failed {
                error: "insufficient margin".into()
            }
        );
        assert_eq!(dl.stats().failed_cycles, 1);
    }

    #[tokio::test]
    async fn test_strategy_error_fails_cycle_only() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(
            vec![
                Err(StrategyError::Internal("boom".into())),
                Ok(trade(Side::Buy)),
            ],
            gateway,
            TradeMode::Simulate,
        );

        assert!(dl.run_cycle().await.is_failed());
        assert!(!dl.run_cycle().await.is_failed());
        assert_eq!(
            dl.stats(),
            LoopStats {
                cycles: 2,
                failed_cycles: 1,
                trades: 1
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![], gateway.clone(), TradeMode::Live);

        dl.shutdown().await.unwrap();
        dl.shutdown().await.unwrap();

        assert!(gateway.is_closed());
        assert!(dl.shutdown_handle().is_shutdown());
        assert!(dl.run_cycle().await.is_failed());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_request() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![Ok(trade(Side::Buy))], gateway.clone(), TradeMode::Simulate);
        let handle = dl.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.shutdown();
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), dl.run())
            .await
            .expect("loop did not stop")
            .unwrap();

        assert!(stats.cycles >= 1);
        assert_eq!(stats.trades, 1);
        assert!(!dl.feed().is_running());
        assert!(gateway.is_closed());
    }

    #[tokio::test]
    async fn test_run_after_shutdown_does_not_restart_feed() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![Ok(trade(Side::Buy))], gateway.clone(), TradeMode::Simulate);

        dl.shutdown().await.unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(5), dl.run())
            .await
            .expect("run after shutdown did not return")
            .unwrap();

        assert_eq!(stats, LoopStats::default());
        assert!(!dl.feed().is_running());
        assert!(dl.trade_history().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_requested_before_run_skips_cycles() {
        let gateway = Arc::new(PaperGateway::new());
        let mut dl = decision_loop(vec![Ok(trade(Side::Buy))], gateway.clone(), TradeMode::Simulate);
        dl.shutdown_handle().shutdown();

        let stats = tokio::time::timeout(Duration::from_secs(5), dl.run())
            .await
            .expect("loop did not stop")
            .unwrap();

        assert_eq!(stats.cycles, 0);
        assert!(!dl.feed().is_running());
        assert!(gateway.is_closed());
    }
}

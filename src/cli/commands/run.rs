//! Run command: quote feed plus decision loop.

use anyhow::{Context, Result};
use fx_config::load_config;
use fx_core::traits::{ExecutionGateway, QuoteSource};
use fx_core::types::{ExecutionStatus, TradeMode};
use fx_data::{FeedConfig, HistoricalSeriesStore, Journal, MarketDataFeed};
use fx_engine::{DecisionLoop, DecisionLoopConfig};
use fx_strategies::StrategyRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{api_client, execution_gateway, history_config};
use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let mode = args.mode.unwrap_or(config.engine.trade_mode);

    let client = api_client(&config)?;
    let gateway = execution_gateway(&client);
    let source: Arc<dyn QuoteSource> = client.clone();

    let history = history_config(&config);
    let history_source = source.clone();
    let strategy = StrategyRegistry::new()
        .create(&config.strategy.name, config.strategy.params.clone(), move || {
            HistoricalSeriesStore::new(history_source, history)
        })
        .with_context(|| format!("Failed to create strategy '{}'", config.strategy.name))?;

    // Poll everything the strategy reads, even if the feed list omits it.
    let mut instruments = config.feed.instruments()?;
    for instrument in strategy.instruments() {
        if !instruments.contains(&instrument) {
            warn!(%instrument, "strategy instrument missing from feed.instruments; polling it anyway");
            instruments.push(instrument);
        }
    }
    let feed_config = FeedConfig {
        instruments,
        poll_interval: config.feed.poll_interval(),
        error_backoff: config.feed.error_backoff(),
        stop_timeout: config.feed.stop_timeout(),
    };
    let feed = match &config.feed.journal_dir {
        Some(dir) => MarketDataFeed::with_journal(source, feed_config, Journal::new(dir)),
        None => MarketDataFeed::new(source, feed_config),
    };

    let mut engine = DecisionLoop::new(
        feed,
        strategy,
        gateway,
        DecisionLoopConfig {
            mode,
            decision_interval: config.engine.decision_interval(),
        },
    );

    let handle = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            handle.shutdown();
        }
    });

    info!(
        strategy = %config.strategy.name,
        %mode,
        "Starting decision loop (Ctrl-C to stop)"
    );
    if mode == TradeMode::Live {
        warn!("Live mode: trade intents are sent to the execution gateway");
    }

    let result = engine.run().await;
    // The client also serves quotes, so close it even when trades went to paper.
    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close API client");
    }
    let stats = result.context("Shutdown did not complete cleanly")?;

    println!();
    println!("Session summary");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Cycles:        {}", stats.cycles);
    println!("  Failed cycles: {}", stats.failed_cycles);
    println!("  Trades:        {}", stats.trades);
    for record in engine.trade_history() {
        let status = match &record.status {
            ExecutionStatus::Simulated => "simulated".to_string(),
            ExecutionStatus::Executed { transaction_id } => format!("executed {}", transaction_id),
            ExecutionStatus::Failed { error } => format!("failed: {}", error),
        };
        println!(
            "  {}  {}  ({})",
            record.intent.timestamp().format("%Y-%m-%d %H:%M:%S"),
            record.intent,
            status
        );
    }

    Ok(())
}

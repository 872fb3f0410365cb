//! CLI command implementations.

pub mod history;
pub mod init;
pub mod run;
pub mod strategies;
pub mod validate;

use anyhow::{Context, Result};
use fx_broker::{HttpConfig, HttpFxClient, PaperGateway};
use fx_config::AppConfig;
use fx_core::traits::ExecutionGateway;
use fx_data::HistoryConfig;
use std::sync::Arc;
use tracing::info;

/// API client built from the `[api]` section.
pub(crate) fn api_client(config: &AppConfig) -> Result<Arc<HttpFxClient>> {
    let http = HttpConfig {
        timeout: config.api.timeout(),
        ..HttpConfig::new(&config.api.base_url, config.api.resolved_api_key())
    };
    let client = HttpFxClient::new(http).context("Failed to create API client")?;
    Ok(Arc::new(client))
}

/// Gateway for trade intents: the paper gateway under the demo key, the
/// client itself otherwise. Closing it does not close a demo client.
pub(crate) fn execution_gateway(client: &Arc<HttpFxClient>) -> Arc<dyn ExecutionGateway> {
    if client.config().is_demo() {
        info!("Demo API key: trades go to the paper gateway");
        Arc::new(PaperGateway::new())
    } else {
        client.clone()
    }
}

pub(crate) fn history_config(config: &AppConfig) -> HistoryConfig {
    HistoryConfig {
        data_dir: config.history.data_dir.clone(),
        initial_lookback_days: config.history.initial_lookback_days,
        freshness_days: config.history.freshness_days,
    }
}

//! HTTP client for the quote and trade API.

use async_trait::async_trait;
use chrono::NaiveDate;
use fx_core::error::{ExecutionError, FetchError};
use fx_core::traits::{ExecutionGateway, QuoteSource};
use fx_core::types::{ExecutionReport, Instrument, PricePoint, TradeIntent};
use reqwest::{header, Client, Response};
use rust_decimal::prelude::ToPrimitive;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// API client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_key: String,
    /// Applied to every request
    pub timeout: Duration,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// The demo key selects simulated execution.
    pub fn is_demo(&self) -> bool {
        self.api_key == "demo"
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com".to_string(),
            api_key: "demo".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("fx-trader/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// API response types
#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(default)]
    rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoricalRatesResponse {
    #[serde(default)]
    rates: Vec<PricePoint>,
}

#[derive(Debug, Serialize)]
struct TradeRequest<'a> {
    action: &'a str,
    currency_pair: String,
    amount: f64,
    price: f64,
}

/// Quote and trade API client.
///
/// Serves as both the [`QuoteSource`] and the live [`ExecutionGateway`].
pub struct HttpFxClient {
    config: HttpConfig,
    client: Client,
    closed: AtomicBool,
}

impl HttpFxClient {
    /// Create a new API client.
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "API-Key",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| FetchError::InvalidRequest(format!("API key header: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        info!(base_url = %config.base_url, demo = config.is_demo(), "API client initialised");
        Ok(Self {
            config,
            client,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn ensure_open(&self) -> Result<(), FetchError> {
        if self.is_closed() {
            return Err(FetchError::Closed);
        }
        Ok(())
    }

    fn map_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, resp: Response) -> Result<T, FetchError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        resp.json().await.map_err(|e| self.map_error(e))
    }
}

#[async_trait]
impl QuoteSource for HttpFxClient {
    async fn current_rate(&self, instrument: &Instrument) -> Result<Option<f64>, FetchError> {
        self.ensure_open()?;
        let url = self.url(&format!(
            "/v1/exchange_rate/{}/{}",
            instrument.base(),
            instrument.quote()
        ));

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let data: RateResponse = self.read_json(resp).await?;

        if data.rate.is_none() {
            warn!(%instrument, "response carried no rate");
        }
        Ok(data.rate)
    }

    async fn historical_rates(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.ensure_open()?;
        let url = self.url("/v1/historical_rates");
        let params = [
            ("currency_pair", instrument.key()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
            ("interval", "daily".to_string()),
        ];

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let data: HistoricalRatesResponse = self.read_json(resp).await?;

        debug!(%instrument, %start, %end, points = data.rates.len(), "historical rates received");
        Ok(data.rates)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl ExecutionGateway for HttpFxClient {
    async fn execute(&self, intent: &TradeIntent) -> Result<ExecutionReport, ExecutionError> {
        if self.is_closed() {
            return Err(ExecutionError::Closed);
        }

        let amount = intent
            .amount()
            .to_f64()
            .ok_or_else(|| ExecutionError::Rejected(format!("amount {} out of range", intent.amount())))?;
        let request = TradeRequest {
            action: intent.action().as_str(),
            currency_pair: intent.instrument().key(),
            amount,
            price: intent.price(),
        };

        let resp = self
            .client
            .post(self.url("/v1/trade"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let report: ExecutionReport = self.read_json(resp).await?;

        match (report.success, &report.transaction_id) {
            (true, Some(id)) => info!(transaction_id = %id, %intent, "trade executed"),
            (true, None) => info!(%intent, "trade executed without transaction id"),
            (false, _) => warn!(%intent, error = ?report.error, "trade rejected"),
        }
        Ok(report)
    }

    async fn close(&self) -> Result<(), ExecutionError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("API client closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

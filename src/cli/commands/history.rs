//! Historical series command.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fx_config::load_config;
use fx_core::types::Instrument;
use fx_data::HistoricalSeriesStore;
use std::path::Path;

use super::{api_client, history_config};
use crate::cli::HistoryArgs;

fn parse_date(value: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .with_context(|| format!("--{} must be YYYY-MM-DD, got '{}'", flag, v))
        })
        .transpose()
}

pub async fn run(args: HistoryArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let instrument: Instrument = args.pair.parse()?;
    let start = parse_date(args.start.as_deref(), "start")?;
    let end = parse_date(args.end.as_deref(), "end")?;

    let mut store = HistoricalSeriesStore::new(api_client(&config)?, history_config(&config));

    let series = store
        .load(&instrument, start, end)
        .await
        .with_context(|| format!("Failed to load history for {}", instrument))?;
    let sma = store.moving_average(&instrument, args.window, start, end).await?;
    let vol = store.volatility(&instrument, args.window, start, end).await?;

    println!("{} ({} points)", instrument, series.len());
    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        println!("Range: {} to {}", first, last);
    }
    println!();
    println!("  {:<12} {:>12} {:>12} {:>12}", "date", "rate", "sma", "volatility");

    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.5}", v));
    let skip = series.len().saturating_sub(args.tail);
    for ((point, ma), sd) in series.iter().zip(&sma).zip(&vol).skip(skip) {
        println!(
            "  {:<12} {:>12.5} {:>12} {:>12}",
            point.date.to_string(),
            point.rate,
            fmt(ma.value),
            fmt(sd.value)
        );
    }

    Ok(())
}

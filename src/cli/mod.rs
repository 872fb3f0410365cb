//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use fx_core::types::TradeMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fx-trader")]
#[command(author, version, about = "Currency quote ingestion and trade-signal pipeline")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "FX_CONFIG")]
    pub config: PathBuf,

    /// Log level (defaults to the configured level)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the quote feed and the decision loop until Ctrl-C
    Run(RunArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
    /// Write a default configuration file
    InitConfig(InitArgs),
    /// Load a historical series and print its analytics
    History(HistoryArgs),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Trade mode, overriding the configured one (simulate, live)
    #[arg(short, long)]
    pub mode: Option<TradeMode>,
}

#[derive(clap::Args)]
pub struct InitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args)]
pub struct HistoryArgs {
    /// Currency pair, e.g. EUR/USD
    pub pair: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Moving average and volatility window
    #[arg(short, long, default_value = "20")]
    pub window: usize,

    /// Number of trailing rows to print
    #[arg(long, default_value = "10")]
    pub tail: usize,
}

//! CLI argument definitions for finvestor.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bars` | Historical OHLCV bars for one or more tickers |
//! | `latest` | Most recent bar |
//! | `price` | Price at a timestamp |
//! | `asset` | Ticker metadata |
//! | `activity` | Partitioned eToro account activity |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--provider` | `FINVESTOR_DATA_PROVIDER` | Primary bar provider |
//! | `--timeout-ms` | `FINVESTOR_HTTP_TIMEOUT_MS` | Per-request timeout |
//!
//! # Examples
//!
//! ```bash
//! finvestor bars AAPL --period 5d --interval 1h --pretty
//! finvestor bars AAPL,MSFT --start 2024-01-02T00:00:00Z --end 2024-02-01T00:00:00Z
//! finvestor price AAPL --at 2024-03-15T14:30:00Z
//! finvestor activity statement.csv
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use finvestor_core::ProviderId;

/// Historical market data from Yahoo Finance and Alpaca.
#[derive(Debug, Parser)]
#[command(
    name = "finvestor",
    author,
    version,
    about = "Historical market data from Yahoo Finance and Alpaca",
    long_about = "finvestor fetches historical OHLCV bars, picks a valid interval for the \
requested window and falls back from Alpaca to Yahoo when Alpaca cannot serve a request.\n\
\n\
Configuration is read from the environment (and a .env file). Use \
'finvestor <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Primary bar provider; overrides FINVESTOR_DATA_PROVIDER.
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderSelector>,

    /// Per-request timeout in milliseconds; overrides FINVESTOR_HTTP_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderSelector {
    Yahoo,
    Alpaca,
}

impl From<ProviderSelector> for ProviderId {
    fn from(value: ProviderSelector) -> Self {
        match value {
            ProviderSelector::Yahoo => Self::Yahoo,
            ProviderSelector::Alpaca => Self::Alpaca,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch historical OHLCV bars.
    ///
    /// Give either --period, or --start with an optional --end.
    ///
    /// # Examples
    ///
    ///   finvestor bars AAPL --period 1mo
    ///   finvestor bars AAPL,MSFT --period 5d --interval 15m
    ///   finvestor bars BTC-USD --start 2024-03-01T00:00:00Z --interval 1h
    Bars(BarsArgs),

    /// Fetch the most recent bar.
    Latest(LatestArgs),

    /// Price at a timestamp: the open or close of the bar containing it,
    /// whichever edge is nearer.
    Price(PriceArgs),

    /// Fetch ticker metadata (name, exchange, sector, ISIN).
    Asset(AssetArgs),

    /// Parse an eToro "Account Activity" CSV or an account statement workbook.
    Activity(ActivityArgs),
}

#[derive(Debug, Args)]
pub struct BarsArgs {
    /// Comma-separated tickers, e.g. AAPL,MSFT.
    pub tickers: String,

    /// Lookback: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max or a duration.
    #[arg(long)]
    pub period: Option<String>,

    /// Window start (RFC 3339 with offset).
    #[arg(long)]
    pub start: Option<String>,

    /// Window end (RFC 3339 with offset).
    #[arg(long)]
    pub end: Option<String>,

    /// Bar interval, or `auto` for the finest valid one.
    #[arg(long, default_value = "auto")]
    pub interval: String,

    /// Include pre- and post-market bars.
    #[arg(long, default_value_t = false)]
    pub include_prepost: bool,
}

#[derive(Debug, Args)]
pub struct LatestArgs {
    pub ticker: String,

    #[arg(long, default_value = "1d")]
    pub interval: String,
}

#[derive(Debug, Args)]
pub struct PriceArgs {
    pub ticker: String,

    /// Timestamp (RFC 3339 with offset).
    #[arg(long)]
    pub at: String,

    #[arg(long, default_value = "1m")]
    pub interval: String,
}

#[derive(Debug, Args)]
pub struct AssetArgs {
    pub ticker: String,
}

#[derive(Debug, Args)]
pub struct ActivityArgs {
    /// Path to the CSV export or the `.xlsx` statement.
    pub path: PathBuf,
}

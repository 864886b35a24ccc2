//! # Finvestor Core
//!
//! Historical OHLCV bars from Yahoo Finance and Alpaca, normalized into one
//! bar schema, plus a parser for eToro account-activity exports.
//!
//! ## Overview
//!
//! - **Duration grammar** shared by intervals, periods and delays
//! - **Request validation** before any network call
//! - **Interval negotiation** against per-provider validity tables
//! - **Provider adapters** behind one [`DataSource`] trait
//! - **Fallback routing** from a primary source to a secondary one
//! - **Retry with full-jitter backoff** around every HTTP call
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo chart/quoteSummary and Alpaca bars adapters |
//! | [`config`] | Environment-driven configuration |
//! | [`data_source`] | Data source trait and error taxonomy |
//! | [`domain`] | Durations, intervals, periods, bars, assets |
//! | [`error`] | Validation and top-level errors |
//! | [`etoro`] | eToro account-activity CSV and statement workbook parsers |
//! | [`fetch`] | Interval escalation and multi-ticker fan-out |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Raw provider columns to [`Bars`] |
//! | [`request`] | [`BarsRequest`] builder and provider parameters |
//! | [`retry`] | Retry policy and backoff |
//! | [`routing`] | Primary/secondary [`BarsRouter`] |
//! | [`source`] | Provider identifiers |
//! | [`validity`] | Interval validity tables |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use finvestor_core::{
//!     BarsRequest, BarsRouter, FinvestorConfig, Interval, ReqwestHttpClient, Symbol,
//!     SymbolicPeriod,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FinvestorConfig::from_env()?;
//!     let router = BarsRouter::from_config(&config, Arc::new(ReqwestHttpClient::new()));
//!
//!     let request = BarsRequest::builder(Symbol::parse("AAPL")?)
//!         .period(SymbolicPeriod::FiveDays)
//!         .interval(Interval::OneHour)
//!         .build()?;
//!     let routed = router.get_bars(&request).await?;
//!
//!     println!("{} bars from {}", routed.data.len(), routed.selected_source);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / User     │
//! └────────┬────────┘
//!          │ BarsRequest
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  BarsRouter     │────▶│ fetch_bars       │
//! │ primary → 2nd   │     │ interval ladder  │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ send_with_retry  │
//! │ (Yahoo, Alpaca) │     │ HttpClient       │
//! └────────┬────────┘     └──────────────────┘
//!          │ RawOhlcv
//!          ▼
//! ┌─────────────────┐
//! │ normalize → Bars│
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use finvestor_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::EmptyBars | SourceErrorKind::IntervalsExhausted => "no data",
//!         SourceErrorKind::RateLimited => "rate limited",
//!         SourceErrorKind::InvalidRequest => "bad request",
//!         _ => "provider failure",
//!     }
//! }
//!
//! assert_eq!(describe(&SourceError::empty_bars("none")), "no data");
//! ```

pub mod adapters;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod etoro;
pub mod fetch;
pub mod http_client;
pub mod normalize;
pub mod request;
pub mod retry;
pub mod routing;
pub mod source;
pub mod validity;

#[cfg(test)]
mod test_support;

pub use adapters::{extract_isin, AlpacaAdapter, YahooAdapter};

pub use config::{AlpacaConfig, AlpacaCredentials, ConfigError, FinvestorConfig, YahooConfig};

pub use data_source::{
    CapabilitySet, DataSource, Endpoint, FallbackReason, RawOhlcv, SourceError, SourceErrorKind,
    SourceFuture,
};

pub use domain::{
    parse_duration, Asset, Bar, Bars, Interval, IntervalChoice, Period, Symbol, SymbolicPeriod,
    TimeFrame, UtcDateTime,
};

pub use error::{CoreError, DurationParseError, ValidationError};

pub use etoro::{
    load_account_statement, parse_account_activity, parse_account_statement, to_yahoo_ticker,
    AccountActivity, ActivityError, ActivityKind, ActivityRecord, ActivityTables, ClosedPosition,
    EtoroAccountStatement, EtoroAccountSummary, EtoroFinancialSummary, PositionEvent,
    StatementSheets, TradeSide, Transaction, TransactionClose,
};

pub use fetch::{fetch_bars, fetch_many, parse_symbols};

pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
};

pub use normalize::normalize;

pub use request::{
    BarsRequest, BarsRequestBuilder, HistoricalDelay, HistoricalDelayPolicy, Window,
};

pub use retry::{send_with_retry, Backoff, RandomExponentialSleep, RetryConfig};

pub use routing::{price_at_timestamp, BarsRouter, RouteStep, RouteSuccess};

pub use source::ProviderId;

pub use validity::IntervalValidityTable;

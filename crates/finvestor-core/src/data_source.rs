//! Data source trait and the error taxonomy shared by adapters.
//!
//! # Endpoints
//!
//! | Endpoint | Input | Output | Description |
//! |----------|-------|--------|-------------|
//! | Bars | [`BarsRequest`] + [`Interval`] | [`RawOhlcv`] | OHLCV columns for one ticker |
//! | Asset | [`Symbol`] | [`Asset`] | Static ticker metadata |
//!
//! Adapters return raw columns; [`crate::normalize`] turns them into
//! [`crate::Bars`] and [`crate::fetch`] negotiates the interval.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::request::BarsRequest;
use crate::validity::IntervalValidityTable;
use crate::{Asset, Interval, ProviderId, Symbol};

/// Data endpoint type used for routing and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Bars,
    Asset,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::Asset => "asset",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub bars: bool,
    pub asset: bool,
}

impl CapabilitySet {
    pub const fn new(bars: bool, asset: bool) -> Self {
        Self { bars, asset }
    }

    pub const fn bars_only() -> Self {
        Self::new(true, false)
    }

    pub const fn full() -> Self {
        Self::new(true, true)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Bars => self.bars,
            Endpoint::Asset => self.asset,
        }
    }
}

/// Why a primary source was skipped in favour of the secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The requested end lies inside the provider's historical data embargo.
    HistoricalDelay,
    /// The provider cannot serve the requested interval.
    UnsupportedInterval,
    /// The provider answered with no bars.
    Empty,
}

impl FallbackReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HistoricalDelay => "historical_delay",
            Self::UnsupportedInterval => "unsupported_interval",
            Self::Empty => "empty",
        }
    }
}

impl Display for FallbackReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Provider rejected the parameter combination (HTTP 422).
    UnprocessableEntity,
    /// Provider answered but returned no bars.
    EmptyBars,
    Unavailable,
    RateLimited,
    InvalidRequest,
    UnsupportedEndpoint,
    Internal,
    /// Every candidate interval failed.
    IntervalsExhausted,
}

/// Structured source error used by interval negotiation and router fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
    attempts: Vec<(Interval, SourceError)>,
}

impl SourceError {
    fn with_kind(kind: SourceErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            attempts: Vec::new(),
        }
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::UnprocessableEntity, message, false)
    }

    pub fn empty_bars(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::EmptyBars, message, false)
    }

    pub fn unsupported_endpoint(endpoint: Endpoint) -> Self {
        Self::with_kind(
            SourceErrorKind::UnsupportedEndpoint,
            format!("endpoint '{endpoint}' is not supported by this source"),
            false,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::Unavailable, message, true)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::InvalidRequest, message, false)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::Internal, message, false)
    }

    /// Aggregate of every `(interval, error)` pair tried for `symbol`.
    pub fn intervals_exhausted(symbol: &Symbol, attempts: Vec<(Interval, SourceError)>) -> Self {
        let tried = attempts
            .iter()
            .map(|(interval, _)| interval.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut error = Self::with_kind(
            SourceErrorKind::IntervalsExhausted,
            format!("no bars for '{symbol}' at any valid interval [{tried}]"),
            false,
        );
        error.attempts = attempts;
        error
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// Per-interval causes of an [`SourceErrorKind::IntervalsExhausted`] error.
    pub fn attempts(&self) -> &[(Interval, SourceError)] {
        &self.attempts
    }

    /// True when the provider simply had nothing to return.
    ///
    /// An exhausted negotiation counts as empty when every attempt was.
    pub fn is_empty_result(&self) -> bool {
        match self.kind {
            SourceErrorKind::EmptyBars => true,
            SourceErrorKind::IntervalsExhausted => self
                .attempts
                .iter()
                .all(|(_, error)| error.is_empty_result()),
            _ => false,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::UnprocessableEntity => "source.unprocessable_entity",
            SourceErrorKind::EmptyBars => "source.empty_bars",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::UnsupportedEndpoint => "source.unsupported_endpoint",
            SourceErrorKind::Internal => "source.internal",
            SourceErrorKind::IntervalsExhausted => "source.intervals_exhausted",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())?;
        for (interval, cause) in &self.attempts {
            write!(f, "; {interval}: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SourceError {}

/// Parallel OHLCV columns as returned by a provider, before normalization.
///
/// Columns shorter than `timestamps` are padded with gaps by the normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOhlcv {
    /// Unix seconds.
    pub timestamps: Vec<i64>,
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
}

impl RawOhlcv {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Boxed future returned by [`DataSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Source adapter contract.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](DataSource::id) | Provider identifier |
/// | [`capabilities`](DataSource::capabilities) | Supported endpoints |
/// | [`validity_table`](DataSource::validity_table) | Interval limits by lookback |
/// | [`fetch_ohlcv`](DataSource::fetch_ohlcv) | One ticker, one interval, all pages |
///
/// [`check_request`](DataSource::check_request) and
/// [`asset`](DataSource::asset) have defaults for sources that accept every
/// request and serve no metadata.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    fn validity_table(&self) -> &IntervalValidityTable;

    /// Reports why this source cannot serve `request`, before any I/O.
    fn check_request(&self, _request: &BarsRequest) -> Option<FallbackReason> {
        None
    }

    /// Fetches raw bars for `request.symbol()` at exactly `interval`.
    ///
    /// # Errors
    ///
    /// - [`SourceErrorKind::UnprocessableEntity`] when the provider rejects
    ///   the interval/range combination
    /// - [`SourceErrorKind::EmptyBars`] when no bars come back
    /// - [`SourceErrorKind::Unavailable`] for transport failures and 5xx
    fn fetch_ohlcv<'a>(
        &'a self,
        request: &'a BarsRequest,
        interval: Interval,
    ) -> SourceFuture<'a, RawOhlcv>;

    /// Fetches static metadata for `symbol`.
    fn asset<'a>(&'a self, _symbol: &'a Symbol) -> SourceFuture<'a, Asset> {
        Box::pin(async { Err(SourceError::unsupported_endpoint(Endpoint::Asset)) })
    }
}

//! Validated bar requests and provider wire parameters.
//!
//! A [`BarsRequest`] is built once, validated against the instant it was
//! issued at, and then rendered per attempted interval into [`YahooParams`]
//! or [`AlpacaParams`].
//!
//! ```rust,ignore
//! use finvestor_core::{BarsRequest, Interval, Symbol, SymbolicPeriod};
//!
//! let request = BarsRequest::builder(Symbol::parse("AAPL")?)
//!     .period(SymbolicPeriod::FiveDays)
//!     .interval(Interval::FifteenMinutes)
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::data_source::SourceError;
use crate::{
    Interval, IntervalChoice, Period, Symbol, SymbolicPeriod, TimeFrame, UtcDateTime,
    ValidationError,
};

/// Page size requested from Alpaca.
pub const ALPACA_PAGE_LIMIT: u32 = 10_000;

/// The time range a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Lookback ending at the issue instant.
    Lookback(Period),
    /// Explicit range. An open end is resolved per attempted interval as
    /// `start + interval`.
    Range {
        start: UtcDateTime,
        end: Option<UtcDateTime>,
    },
}

/// A validated request for one symbol's bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsRequest {
    symbol: Symbol,
    window: Window,
    interval: IntervalChoice,
    include_prepost: bool,
    issued_at: UtcDateTime,
}

impl BarsRequest {
    pub fn builder(symbol: Symbol) -> BarsRequestBuilder {
        BarsRequestBuilder::new(symbol)
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub const fn window(&self) -> Window {
        self.window
    }

    pub const fn interval(&self) -> IntervalChoice {
        self.interval
    }

    pub const fn include_prepost(&self) -> bool {
        self.include_prepost
    }

    /// The "now" the request was validated against.
    pub const fn issued_at(&self) -> UtcDateTime {
        self.issued_at
    }

    /// Same window and interval for another ticker.
    pub fn with_symbol(&self, symbol: Symbol) -> Self {
        Self {
            symbol,
            ..self.clone()
        }
    }

    /// How far back the request reaches, used to pick valid intervals.
    ///
    /// `now - start` for explicit ranges, the period length for lookbacks.
    pub fn span(&self) -> TimeFrame {
        match self.window {
            Window::Lookback(period) => period.span_at(self.issued_at),
            Window::Range { start, .. } => TimeFrame::from_duration(self.issued_at - start),
        }
    }

    /// Range end when fetching at `interval`; `None` for lookbacks.
    pub fn end_for(&self, interval: Interval) -> Option<UtcDateTime> {
        match self.window {
            Window::Lookback(_) => None,
            Window::Range { start, end } => {
                Some(end.unwrap_or_else(|| start.saturating_add(interval.duration().duration())))
            }
        }
    }

    pub fn yahoo_params(&self, interval: Interval) -> YahooParams {
        let range = match self.window {
            Window::Lookback(Period::Symbolic(period)) => YahooRange::Named(period),
            Window::Lookback(Period::Span(span)) => YahooRange::Epochs {
                period1: self.issued_at.saturating_sub(span.duration()).unix_timestamp(),
                period2: self.issued_at.unix_timestamp(),
            },
            Window::Range { start, .. } => YahooRange::Epochs {
                period1: start.unix_timestamp(),
                period2: self
                    .end_for(interval)
                    .unwrap_or(self.issued_at)
                    .unix_timestamp(),
            },
        };

        YahooParams {
            interval,
            range,
            include_prepost: self.include_prepost,
        }
    }

    /// Renders Alpaca parameters, applying the historical data embargo.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when Alpaca has no timeframe for `interval`, or when
    /// the range end falls inside the embargo and cannot be clamped.
    pub fn alpaca_params(
        &self,
        interval: Interval,
        delay: &HistoricalDelay,
    ) -> Result<AlpacaParams, SourceError> {
        let timeframe = interval.alpaca_timeframe().ok_or_else(|| {
            SourceError::invalid_request(format!("interval '{interval}' is not served by alpaca"))
        })?;

        let (start, end) = match self.window {
            Window::Lookback(period) => {
                let end = delay.cutoff(self.issued_at);
                (end.saturating_sub(period.span_at(self.issued_at).duration()), end)
            }
            Window::Range { start, .. } => {
                let end = self.end_for(interval).unwrap_or(self.issued_at);
                (start, delay.resolve_end(start, end, self.issued_at)?)
            }
        };

        Ok(AlpacaParams {
            start,
            end,
            timeframe,
            limit: ALPACA_PAGE_LIMIT,
            adjustment: (!self.symbol.is_crypto_pair()).then_some("all"),
            page_token: None,
        })
    }
}

/// Builder for [`BarsRequest`].
#[derive(Debug, Clone)]
pub struct BarsRequestBuilder {
    symbol: Symbol,
    period: Option<Period>,
    start: Option<UtcDateTime>,
    end: Option<UtcDateTime>,
    interval: IntervalChoice,
    include_prepost: bool,
}

impl BarsRequestBuilder {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            period: None,
            start: None,
            end: None,
            interval: IntervalChoice::Auto,
            include_prepost: false,
        }
    }

    pub fn period(mut self, period: impl Into<Period>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn start(mut self, start: UtcDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: UtcDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn interval(mut self, interval: impl Into<IntervalChoice>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn include_prepost(mut self, include_prepost: bool) -> Self {
        self.include_prepost = include_prepost;
        self
    }

    pub fn build(self) -> Result<BarsRequest, ValidationError> {
        self.build_at(UtcDateTime::now())
    }

    /// Validates against an explicit "now".
    pub fn build_at(self, now: UtcDateTime) -> Result<BarsRequest, ValidationError> {
        let window = match (self.period, self.start, self.end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ValidationError::PeriodAndRange)
            }
            (None, None, _) => return Err(ValidationError::MissingPeriodOrStart),
            (Some(period), None, None) => {
                if let Some(interval) = self.interval.exact() {
                    if interval.duration() >= period.span_at(now) {
                        return Err(ValidationError::IntervalExceedsPeriod {
                            interval: interval.to_string(),
                            period: period.to_string(),
                        });
                    }
                }
                Window::Lookback(period)
            }
            (None, Some(start), end) => {
                if start >= now {
                    return Err(ValidationError::StartNotInPast {
                        start: start.to_string(),
                        now: now.to_string(),
                    });
                }
                let end = match (end, self.interval.exact()) {
                    (Some(end), exact) => {
                        if start >= end {
                            return Err(ValidationError::StartNotBeforeEnd {
                                start: start.to_string(),
                                end: end.to_string(),
                            });
                        }
                        let window = TimeFrame::from_duration(end - start);
                        if let Some(interval) = exact.filter(|i| i.duration() > window) {
                            return Err(ValidationError::IntervalExceedsWindow {
                                interval: interval.to_string(),
                                window: window.to_string(),
                            });
                        }
                        Some(end)
                    }
                    (None, Some(interval)) => {
                        Some(start.saturating_add(interval.duration().duration()))
                    }
                    (None, None) => None,
                };
                Window::Range { start, end }
            }
        };

        Ok(BarsRequest {
            symbol: self.symbol,
            window,
            interval: self.interval,
            include_prepost: self.include_prepost,
            issued_at: now,
        })
    }
}

// ============================================================================
// Historical data embargo
// ============================================================================

/// What to do with a range end that falls inside the embargo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoricalDelayPolicy {
    #[default]
    Reject,
    Clamp,
}

impl HistoricalDelayPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "clamp" => Some(Self::Clamp),
            _ => None,
        }
    }
}

/// Provider-side lag before bars become available (Alpaca free tier: 15m).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoricalDelay {
    pub delay: Duration,
    pub policy: HistoricalDelayPolicy,
}

impl HistoricalDelay {
    pub const fn new(delay: Duration, policy: HistoricalDelayPolicy) -> Self {
        Self { delay, policy }
    }

    /// Latest servable instant.
    pub fn cutoff(&self, now: UtcDateTime) -> UtcDateTime {
        now.saturating_sub(self.delay)
    }

    /// Whether `end` is too recent. A zero delay never embargoes.
    pub fn embargoes(&self, end: UtcDateTime, now: UtcDateTime) -> bool {
        !self.delay.is_zero() && now - end <= self.delay
    }

    fn resolve_end(
        &self,
        start: UtcDateTime,
        end: UtcDateTime,
        now: UtcDateTime,
    ) -> Result<UtcDateTime, SourceError> {
        if !self.embargoes(end, now) {
            return Ok(end);
        }
        let refusal = || {
            SourceError::invalid_request(
                ValidationError::WithinHistoricalDelay {
                    end: end.to_string(),
                    delay: TimeFrame::from_duration(self.delay).to_string(),
                }
                .to_string(),
            )
        };
        match self.policy {
            HistoricalDelayPolicy::Reject => Err(refusal()),
            HistoricalDelayPolicy::Clamp => {
                let clamped = self.cutoff(now);
                if start >= clamped {
                    return Err(refusal());
                }
                Ok(clamped)
            }
        }
    }
}

// ============================================================================
// Wire parameters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YahooRange {
    Named(SymbolicPeriod),
    Epochs { period1: i64, period2: i64 },
}

/// Query parameters for the Yahoo chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YahooParams {
    pub interval: Interval,
    pub range: YahooRange,
    pub include_prepost: bool,
}

impl YahooParams {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        match self.range {
            YahooRange::Named(period) => pairs.push(("range", period.as_str().to_owned())),
            YahooRange::Epochs { period1, period2 } => {
                pairs.push(("period1", period1.to_string()));
                pairs.push(("period2", period2.to_string()));
            }
        }
        pairs.push(("interval", self.interval.as_str().to_owned()));
        pairs.push(("includePrePost", self.include_prepost.to_string()));
        pairs.push(("events", String::from("div,splits")));
        pairs
    }
}

/// Query parameters for the Alpaca bars endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlpacaParams {
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub timeframe: &'static str,
    pub limit: u32,
    /// `all` for stocks; crypto endpoints take no adjustment.
    pub adjustment: Option<&'static str>,
    pub page_token: Option<String>,
}

impl AlpacaParams {
    pub fn with_page_token(&self, token: impl Into<String>) -> Self {
        Self {
            page_token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("start", self.start.format_rfc3339()),
            ("end", self.end.format_rfc3339()),
            ("timeframe", self.timeframe.to_owned()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(adjustment) = self.adjustment {
            pairs.push(("adjustment", adjustment.to_owned()));
        }
        if let Some(token) = &self.page_token {
            pairs.push(("page_token", token.clone()));
        }
        pairs
    }
}

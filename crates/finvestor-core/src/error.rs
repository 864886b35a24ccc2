use thiserror::Error;

use crate::data_source::SourceError;
use crate::etoro::ActivityError;

/// Validation and contract errors exposed by `finvestor-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter, digit or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error(
        "invalid interval '{value}', expected auto or one of \
         1m, 2m, 5m, 15m, 30m, 1h, 1d, 5d, 1mo, 3mo"
    )]
    InvalidInterval { value: String },
    #[error("invalid period '{value}'")]
    InvalidPeriod { value: String },
    #[error("invalid source '{value}', expected one of yahoo, alpaca")]
    InvalidSource { value: String },

    #[error("naive datetime '{value}' has no UTC offset")]
    NaiveDateTime { value: String },
    #[error("timestamp must be RFC3339 with an offset: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("please provide either a period or start[-end] datetimes")]
    MissingPeriodOrStart,
    #[error("please provide only one of period or start[-end] datetimes")]
    PeriodAndRange,
    #[error("start {start} must be before now ({now})")]
    StartNotInPast { start: String, now: String },
    #[error("start {start} must be before end {end}")]
    StartNotBeforeEnd { start: String, end: String },
    #[error("interval {interval} must be smaller than period {period}")]
    IntervalExceedsPeriod { interval: String, period: String },
    #[error("interval {interval} is larger than the requested window of {window}")]
    IntervalExceedsWindow { interval: String, window: String },
    #[error("end {end} falls inside the historical data delay of {delay}")]
    WithinHistoricalDelay { end: String, delay: String },

    #[error("bars must contain at least one bar")]
    EmptyBars,
}

/// Malformed duration input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("duration string is empty")]
    Empty,
    #[error("no duration tokens found in '{value}'")]
    NoTokens { value: String },
    #[error("missing or unrecognized unit '{unit}' after {quantity} in '{value}'")]
    UnknownUnit {
        value: String,
        quantity: String,
        unit: String,
    },
    #[error("duration '{value}' is out of range")]
    OutOfRange { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] DurationParseError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

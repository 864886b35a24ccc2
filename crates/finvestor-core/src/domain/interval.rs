use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

use super::duration::{months_in_seconds, TimeFrame};
use crate::ValidationError;

/// Bar granularity.
///
/// Variants are declared finest first so the derived ordering matches the
/// resolved span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    OneMinute,
    TwoMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
}

impl Interval {
    pub const ALL: [Self; 10] = [
        Self::OneMinute,
        Self::TwoMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
    ];

    /// Granularities served by the Alpaca bars API.
    pub const ALPACA: [Self; 7] = [
        Self::OneMinute,
        Self::TwoMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::OneDay,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::TwoMinutes => "2m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
        }
    }

    pub fn duration(self) -> TimeFrame {
        let duration = match self {
            Self::OneMinute => Duration::minutes(1),
            Self::TwoMinutes => Duration::minutes(2),
            Self::FiveMinutes => Duration::minutes(5),
            Self::FifteenMinutes => Duration::minutes(15),
            Self::ThirtyMinutes => Duration::minutes(30),
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::days(1),
            Self::FiveDays => Duration::days(5),
            Self::OneMonth => Duration::seconds_f64(months_in_seconds(1.0)),
            Self::ThreeMonths => Duration::seconds_f64(months_in_seconds(3.0)),
        };
        TimeFrame::from_duration(duration)
    }

    /// Alpaca `timeframe` query value, or `None` when Alpaca cannot serve it.
    pub const fn alpaca_timeframe(self) -> Option<&'static str> {
        match self {
            Self::OneMinute => Some("1Min"),
            Self::TwoMinutes => Some("2Min"),
            Self::FiveMinutes => Some("5Min"),
            Self::FifteenMinutes => Some("15Min"),
            Self::ThirtyMinutes => Some("30Min"),
            Self::OneHour => Some("1Hour"),
            Self::OneDay => Some("1Day"),
            Self::FiveDays | Self::OneMonth | Self::ThreeMonths => None,
        }
    }

    /// The enumerated interval whose span equals `time_frame` exactly.
    pub fn from_time_frame(time_frame: TimeFrame) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.duration() == time_frame)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical tokens plus any duration spelling that resolves to
/// one of them (`60s`, `1Min`, `1Hour`).
impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(interval) = Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == trimmed)
        {
            return Ok(interval);
        }

        TimeFrame::parse(trimmed)
            .ok()
            .and_then(Self::from_time_frame)
            .ok_or_else(|| ValidationError::InvalidInterval {
                value: trimmed.to_owned(),
            })
    }
}

impl TryFrom<String> for Interval {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.as_str().to_owned()
    }
}

/// Requested granularity: a fixed interval, or `auto` to let the fetcher pick
/// the finest one the provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntervalChoice {
    #[default]
    Auto,
    Exact(Interval),
}

impl IntervalChoice {
    pub const fn exact(self) -> Option<Interval> {
        match self {
            Self::Auto => None,
            Self::Exact(interval) => Some(interval),
        }
    }
}

impl From<Interval> for IntervalChoice {
    fn from(value: Interval) -> Self {
        Self::Exact(value)
    }
}

impl Display for IntervalChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Exact(interval) => Display::fmt(interval, f),
        }
    }
}

impl FromStr for IntervalChoice {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        Interval::from_str(value).map(Self::Exact)
    }
}

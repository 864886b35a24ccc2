use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

use super::duration::{months_in_seconds, TimeFrame, DAYS_PER_YEAR};
use super::interval::Interval;
use super::timestamp::UtcDateTime;
use crate::ValidationError;

/// Named lookback windows understood by the Yahoo `range` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SymbolicPeriod {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl SymbolicPeriod {
    pub const ALL: [Self; 11] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::FiveYears,
        Self::TenYears,
        Self::YearToDate,
        Self::Max,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }

    /// Span covered when evaluated at `now`. `ytd` runs from January 1 and
    /// `max` is capped at ten years.
    pub fn span_at(self, now: UtcDateTime) -> TimeFrame {
        let years = |count: f64| Duration::seconds_f64(count * DAYS_PER_YEAR * 86_400.0);
        let duration = match self {
            Self::OneDay => Duration::days(1),
            Self::FiveDays => Duration::days(5),
            Self::OneMonth => Duration::seconds_f64(months_in_seconds(1.0)),
            Self::ThreeMonths => Duration::seconds_f64(months_in_seconds(3.0)),
            Self::SixMonths => Duration::seconds_f64(months_in_seconds(6.0)),
            Self::OneYear => years(1.0),
            Self::TwoYears => years(2.0),
            Self::FiveYears => years(5.0),
            Self::TenYears | Self::Max => years(10.0),
            Self::YearToDate => now - now.start_of_year(),
        };
        TimeFrame::from_duration(duration)
    }
}

impl Display for SymbolicPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolicPeriod {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|period| period.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidPeriod {
                value: value.trim().to_owned(),
            })
    }
}

impl TryFrom<String> for SymbolicPeriod {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<SymbolicPeriod> for String {
    fn from(value: SymbolicPeriod) -> Self {
        value.as_str().to_owned()
    }
}

/// Lookback relative to "now": a named range or an arbitrary span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Symbolic(SymbolicPeriod),
    Span(TimeFrame),
}

impl Period {
    /// Shortest lookback that still yields bars for `interval`.
    pub const fn for_interval(interval: Interval) -> Self {
        let period = match interval {
            Interval::OneMinute
            | Interval::TwoMinutes
            | Interval::FiveMinutes
            | Interval::FifteenMinutes
            | Interval::ThirtyMinutes
            | Interval::OneHour => SymbolicPeriod::OneDay,
            Interval::OneDay | Interval::FiveDays => SymbolicPeriod::OneMonth,
            Interval::OneMonth | Interval::ThreeMonths => SymbolicPeriod::SixMonths,
        };
        Self::Symbolic(period)
    }

    pub fn span_at(self, now: UtcDateTime) -> TimeFrame {
        match self {
            Self::Symbolic(period) => period.span_at(now),
            Self::Span(span) => span,
        }
    }
}

impl From<SymbolicPeriod> for Period {
    fn from(value: SymbolicPeriod) -> Self {
        Self::Symbolic(value)
    }
}

impl From<TimeFrame> for Period {
    fn from(value: TimeFrame) -> Self {
        Self::Span(value)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symbolic(period) => Display::fmt(period, f),
            Self::Span(span) => Display::fmt(span, f),
        }
    }
}

/// Named ranges win over duration parsing, so `ytd` stays calendar-anchored.
impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(symbolic) = SymbolicPeriod::from_str(value) {
            return Ok(Self::Symbolic(symbolic));
        }
        TimeFrame::parse(value)
            .map(Self::Span)
            .map_err(|_| ValidationError::InvalidPeriod {
                value: value.trim().to_owned(),
            })
    }
}

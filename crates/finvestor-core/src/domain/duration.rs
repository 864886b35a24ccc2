//! Human-friendly duration parsing.
//!
//! Accepted forms, tried in order:
//!
//! | Form | Example |
//! |------|---------|
//! | ISO-8601 | `P3DT12H30M5S` |
//! | clock | `1 day, 10:30:00`, `05:00`, `42` |
//! | literals | `mtd`, `ytd` |
//! | unit tokens | `15m`, `1month 3weeks`, `1Hour`, `1y 3.5mo` |
//!
//! Months and years are fixed approximations ([`DAYS_PER_MONTH`] and
//! [`DAYS_PER_YEAR`] days), not calendar arithmetic.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Duration;

use crate::DurationParseError;

/// Length of the synthetic month used by `mo` and `mtd`.
pub const DAYS_PER_MONTH: f64 = 30.417;
/// Length of the synthetic year used by `y` and `ytd`.
pub const DAYS_PER_YEAR: f64 = 365.0;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

pub(crate) fn months_in_seconds(count: f64) -> f64 {
    count * (DAYS_PER_MONTH * SECONDS_PER_DAY)
}

fn iso8601_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<sign>[-+]?)P(?:(?P<days>\d+(?:\.\d+)?)D)?",
            r"(?:T(?:(?P<hours>\d+(?:\.\d+)?)H)?",
            r"(?:(?P<minutes>\d+(?:\.\d+)?)M)?",
            r"(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$",
        ))
        .expect("iso8601 duration pattern is valid")
    })
}

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:(?P<days>-?\d+) (?:days?,? )?)?",
            r"(?:(?:(?P<hours>-?\d+):)?(?P<minutes>-?\d+):)?",
            r"(?P<seconds>-?\d+)(?:\.(?P<fraction>\d{1,9}))?$",
        ))
        .expect("clock duration pattern is valid")
    })
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?P<value>\d+(?:\.\d+)?)(?P<unit>mo|s|m|h|d|w|y)?")
            .expect("duration token pattern is valid")
    })
}

/// Parse a duration string into a [`time::Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let seconds = if let Some(seconds) = parse_iso8601(trimmed) {
        seconds
    } else if let Some(seconds) = parse_clock(trimmed) {
        seconds
    } else if trimmed.eq_ignore_ascii_case("mtd") {
        months_in_seconds(1.0)
    } else if trimmed.eq_ignore_ascii_case("ytd") {
        DAYS_PER_YEAR * SECONDS_PER_DAY
    } else {
        parse_unit_tokens(trimmed)?
    };

    seconds_to_duration(seconds, trimmed)
}

fn parse_iso8601(input: &str) -> Option<f64> {
    let captures = iso8601_pattern().captures(input)?;
    let parts = [
        ("days", SECONDS_PER_DAY),
        ("hours", SECONDS_PER_HOUR),
        ("minutes", SECONDS_PER_MINUTE),
        ("seconds", 1.0),
    ];

    let mut matched = false;
    let mut total = 0.0;
    for (name, scale) in parts {
        if let Some(value) = capture_f64(&captures, name) {
            matched = true;
            total += value * scale;
        }
    }
    if !matched {
        return None;
    }

    let negative = captures.name("sign").is_some_and(|sign| sign.as_str() == "-");
    Some(if negative { -total } else { total })
}

fn parse_clock(input: &str) -> Option<f64> {
    let captures = clock_pattern().captures(input)?;
    let days = capture_f64(&captures, "days").unwrap_or(0.0);
    let hours = capture_f64(&captures, "hours").unwrap_or(0.0);
    let minutes = capture_f64(&captures, "minutes").unwrap_or(0.0);
    let seconds = capture_f64(&captures, "seconds").unwrap_or(0.0);
    let fraction = captures
        .name("fraction")
        .and_then(|digits| format!("0.{}", digits.as_str()).parse::<f64>().ok())
        .unwrap_or(0.0);
    let fraction = if seconds < 0.0 { -fraction } else { fraction };

    Some(
        days * SECONDS_PER_DAY
            + hours * SECONDS_PER_HOUR
            + minutes * SECONDS_PER_MINUTE
            + seconds
            + fraction,
    )
}

fn parse_unit_tokens(input: &str) -> Result<f64, DurationParseError> {
    let mut total = 0.0;
    let mut tokens = 0usize;

    for captures in token_pattern().captures_iter(input) {
        tokens += 1;
        let quantity = &captures["value"];
        let value: f64 = quantity
            .parse()
            .map_err(|_| DurationParseError::OutOfRange {
                value: input.to_owned(),
            })?;
        let unit = captures
            .name("unit")
            .map(|unit| unit.as_str().to_ascii_lowercase())
            .unwrap_or_default();

        let scale = match unit.as_str() {
            "s" => 1.0,
            "m" => SECONDS_PER_MINUTE,
            "h" => SECONDS_PER_HOUR,
            "d" => SECONDS_PER_DAY,
            "w" => 7.0 * SECONDS_PER_DAY,
            "mo" => months_in_seconds(1.0),
            "y" => DAYS_PER_YEAR * SECONDS_PER_DAY,
            _ => {
                let trailing = input[captures.get(0).map_or(0, |m| m.end())..]
                    .chars()
                    .take_while(|ch| !ch.is_ascii_whitespace() && !ch.is_ascii_digit())
                    .collect::<String>();
                return Err(DurationParseError::UnknownUnit {
                    value: input.to_owned(),
                    quantity: quantity.to_owned(),
                    unit: trailing,
                });
            }
        };
        total += if unit == "mo" {
            months_in_seconds(value)
        } else {
            value * scale
        };
    }

    if tokens == 0 {
        return Err(DurationParseError::NoTokens {
            value: input.to_owned(),
        });
    }
    Ok(total)
}

fn capture_f64(captures: &Captures<'_>, name: &str) -> Option<f64> {
    captures
        .name(name)
        .and_then(|value| value.as_str().parse::<f64>().ok())
}

fn seconds_to_duration(seconds: f64, input: &str) -> Result<Duration, DurationParseError> {
    if !seconds.is_finite() {
        return Err(DurationParseError::OutOfRange {
            value: input.to_owned(),
        });
    }
    Duration::checked_seconds_f64(seconds).ok_or_else(|| DurationParseError::OutOfRange {
        value: input.to_owned(),
    })
}

/// A resolved time span.
///
/// Equality and ordering compare the resolved span, so `"1m"`, `"60s"` and
/// `"1minute"` are the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeFrame(Duration);

impl TimeFrame {
    pub fn parse(input: &str) -> Result<Self, DurationParseError> {
        parse_duration(input).map(Self)
    }

    /// Numeric input is read as seconds.
    pub fn from_seconds(seconds: f64) -> Result<Self, DurationParseError> {
        seconds_to_duration(seconds, &seconds.to_string()).map(Self)
    }

    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    pub const fn duration(self) -> Duration {
        self.0
    }

    pub fn as_seconds_f64(self) -> f64 {
        self.0.as_seconds_f64()
    }

    pub fn whole_days(self) -> i64 {
        self.0.whole_days()
    }

    /// Returns `None` when the product overflows.
    pub fn checked_mul(self, factor: i32) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }
}

impl From<Duration> for TimeFrame {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl TryFrom<std::time::Duration> for TimeFrame {
    type Error = DurationParseError;

    fn try_from(value: std::time::Duration) -> Result<Self, Self::Error> {
        Duration::try_from(value)
            .map(Self)
            .map_err(|_| DurationParseError::OutOfRange {
                value: format!("{value:?}"),
            })
    }
}

impl FromStr for TimeFrame {
    type Err = DurationParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Renders in the coarsest unit that divides the span exactly.
impl Display for TimeFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.subsec_nanoseconds() != 0 {
            return write!(f, "{}s", self.0.as_seconds_f64());
        }

        let seconds = self.0.whole_seconds();
        let units = [(86_400, "d"), (3_600, "h"), (60, "m")];
        for (size, suffix) in units {
            if seconds != 0 && seconds % size == 0 {
                return write!(f, "{}{suffix}", seconds / size);
            }
        }
        write!(f, "{seconds}s")
    }
}

impl Serialize for TimeFrame {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeFrame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(seconds) => Self::from_seconds(seconds).map_err(D::Error::custom),
            Raw::Text(text) => Self::parse(&text).map_err(D::Error::custom),
        }
    }
}

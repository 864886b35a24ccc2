use std::fmt::{Display, Formatter};
use std::ops::Sub;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::ValidationError;

/// Timezone-aware instant, always held at UTC offset.
///
/// Inputs carrying another offset are converted to the same instant in UTC;
/// inputs without any offset are rejected as naive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        match OffsetDateTime::parse(trimmed, &Rfc3339) {
            Ok(parsed) => Ok(Self::from_offset_datetime(parsed)),
            Err(_) if is_naive(trimmed) => Err(ValidationError::NaiveDateTime {
                value: trimmed.to_owned(),
            }),
            Err(_) => Err(ValidationError::InvalidTimestamp {
                value: trimmed.to_owned(),
            }),
        }
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: seconds.to_string(),
            })
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration))
    }

    pub fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration))
    }

    /// Drops seconds and sub-second precision.
    pub fn truncate_to_minute(self) -> Self {
        let time = self.0.time();
        let truncated = Time::from_hms(time.hour(), time.minute(), 0).unwrap_or(Time::MIDNIGHT);
        Self(self.0.replace_time(truncated))
    }

    /// Midnight of January 1 in this instant's year.
    pub fn start_of_year(self) -> Self {
        let date = Date::from_ordinal_date(self.0.year(), 1).unwrap_or(self.0.date());
        Self(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.to_string())
    }
}

fn is_naive(input: &str) -> bool {
    let with_t = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    let with_space = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    let date_only = format_description!("[year]-[month]-[day]");

    PrimitiveDateTime::parse(input, with_t).is_ok()
        || PrimitiveDateTime::parse(input, with_space).is_ok()
        || Date::parse(input, date_only).is_ok()
}

impl Sub for UtcDateTime {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl From<OffsetDateTime> for UtcDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self::from_offset_datetime(value)
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

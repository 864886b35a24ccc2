use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

/// One OHLCV observation.
///
/// Prices and volume are `NaN` where the provider left a gap; they serialize
/// as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "timestamp")]
    pub ts: UtcDateTime,
    #[serde(with = "nan_as_null")]
    pub open: f64,
    #[serde(with = "nan_as_null")]
    pub high: f64,
    #[serde(with = "nan_as_null")]
    pub low: f64,
    #[serde(with = "nan_as_null")]
    pub close: f64,
    #[serde(with = "nan_as_null")]
    pub volume: f64,
    pub interval: Interval,
}

impl Bar {
    pub const fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        interval: Interval,
    ) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
            interval,
        }
    }

    /// Instant at which the bar closes.
    pub fn close_ts(&self) -> UtcDateTime {
        self.ts.saturating_add(self.interval.duration().duration())
    }
}

/// Non-empty, time-ordered bars for one symbol at one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BarsRecord")]
pub struct Bars {
    symbol: Symbol,
    interval: Interval,
    bars: Vec<Bar>,
}

impl Bars {
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, ValidationError> {
        if bars.is_empty() {
            return Err(ValidationError::EmptyBars);
        }
        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub const fn interval(&self) -> Interval {
        self.interval
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn into_vec(self) -> Vec<Bar> {
        self.bars
    }
}

impl<'a> IntoIterator for &'a Bars {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

#[derive(Deserialize)]
struct BarsRecord {
    symbol: Symbol,
    interval: Interval,
    bars: Vec<Bar>,
}

impl TryFrom<BarsRecord> for Bars {
    type Error = ValidationError;

    fn try_from(value: BarsRecord) -> Result<Self, Self::Error> {
        Self::new(value.symbol, value.interval, value.bars)
    }
}

/// Static descriptive metadata for a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub ticker: Symbol,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub exchange_timezone: Option<String>,
    pub market: Option<String>,
    pub isin: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl Asset {
    pub fn new(ticker: Symbol) -> Self {
        Self {
            ticker,
            name: None,
            asset_type: None,
            currency: None,
            exchange: None,
            exchange_timezone: None,
            market: None,
            isin: None,
            country: None,
            sector: None,
            industry: None,
        }
    }
}

mod nan_as_null {
    use super::*;

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

//! Raw provider columns to canonical [`Bars`].

use crate::data_source::{RawOhlcv, SourceError};
use crate::{Bar, Bars, Interval, Symbol, UtcDateTime};

/// Zips the parallel columns of `raw` by timestamp index.
///
/// Missing values become `NaN` and the row is kept. Every bar carries
/// `interval`.
///
/// # Errors
///
/// `EmptyBars` when `raw` has no timestamps, `Internal` when a timestamp is
/// outside the representable range.
pub fn normalize(symbol: Symbol, raw: RawOhlcv, interval: Interval) -> Result<Bars, SourceError> {
    if raw.is_empty() {
        return Err(SourceError::empty_bars(format!(
            "no bars returned for '{symbol}' at interval {interval}"
        )));
    }

    let column = |values: &[Option<f64>], index: usize| {
        values.get(index).copied().flatten().unwrap_or(f64::NAN)
    };

    let mut bars = Vec::with_capacity(raw.len());
    for (index, seconds) in raw.timestamps.iter().enumerate() {
        let ts = UtcDateTime::from_unix_timestamp(*seconds)
            .map_err(|error| SourceError::internal(error.to_string()))?;
        bars.push(Bar::new(
            ts,
            column(&raw.open, index),
            column(&raw.high, index),
            column(&raw.low, index),
            column(&raw.close, index),
            column(&raw.volume, index),
            interval,
        ));
    }

    Bars::new(symbol, interval, bars).map_err(|error| SourceError::empty_bars(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::test_support::symbol;

    #[test]
    fn gaps_become_nan_and_rows_are_kept() {
        let raw = RawOhlcv {
            timestamps: vec![1_700_000_000, 1_700_000_060],
            open: vec![Some(10.0), None],
            high: vec![Some(11.0), Some(12.0)],
            low: vec![Some(9.5), Some(9.0)],
            close: vec![Some(10.5), None],
            volume: vec![Some(1_000.0)],
        };

        let bars = normalize(symbol("AAPL"), raw, Interval::OneMinute).expect("bars");

        assert_eq!(bars.len(), 2);
        assert_eq!(bars.first().open, 10.0);
        assert_eq!(bars.first().volume, 1_000.0);
        let last = bars.last();
        assert!(last.open.is_nan());
        assert!(last.close.is_nan());
        assert!(last.volume.is_nan());
        assert_eq!(last.high, 12.0);
        assert_eq!(last.ts.unix_timestamp(), 1_700_000_060);
        assert!(bars.iter().all(|bar| bar.interval == Interval::OneMinute));
    }

    #[test]
    fn zero_timestamps_is_empty_bars() {
        let error = normalize(symbol("AAPL"), RawOhlcv::default(), Interval::OneDay)
            .expect_err("no rows");
        assert_eq!(error.kind(), SourceErrorKind::EmptyBars);
    }
}

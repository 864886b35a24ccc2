//! Interval validity tables.
//!
//! Providers only serve fine granularities for recent history (Yahoo keeps
//! 1-minute bars for 7 days, for example). A table maps a maximum lookback in
//! days to the intervals legal up to that lookback; anything older falls back
//! to the table's default set.

use crate::{Interval, IntervalChoice, TimeFrame};

#[derive(Debug, Clone, PartialEq)]
struct IntervalTier {
    max_days: f64,
    intervals: Vec<Interval>,
}

/// Ordered (max lookback, intervals) tiers plus a coarse default.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalValidityTable {
    tiers: Vec<IntervalTier>,
    default: Vec<Interval>,
}

impl IntervalValidityTable {
    /// Tiers are sorted by threshold; each interval list is sorted finest first.
    pub fn new(tiers: Vec<(f64, Vec<Interval>)>, default: Vec<Interval>) -> Self {
        let mut tiers: Vec<IntervalTier> = tiers
            .into_iter()
            .map(|(max_days, mut intervals)| {
                intervals.sort();
                intervals.dedup();
                IntervalTier {
                    max_days,
                    intervals,
                }
            })
            .collect();
        tiers.sort_by(|left, right| left.max_days.total_cmp(&right.max_days));

        let mut default = default;
        default.sort();
        default.dedup();

        Self { tiers, default }
    }

    /// Yahoo chart API limits.
    pub fn yahoo() -> Self {
        use Interval::*;

        Self::new(
            vec![
                (
                    7.0,
                    vec![
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
                    ],
                ),
                (
                    59.9,
                    vec![
                        TwoMinutes,
                        FiveMinutes,
                        FifteenMinutes,
                        ThirtyMinutes,
                        OneHour,
                        OneDay,
                        FiveDays,
                        OneMonth,
                        ThreeMonths,
                    ],
                ),
                (729.9, vec![OneHour, OneDay, FiveDays, OneMonth, ThreeMonths]),
            ],
            vec![OneDay, FiveDays, OneMonth, ThreeMonths],
        )
    }

    /// Alpaca serves every supported timeframe regardless of lookback.
    pub fn alpaca() -> Self {
        Self::new(Vec::new(), Interval::ALPACA.to_vec())
    }

    /// Intervals legal for `span`, finest first.
    ///
    /// The span is measured in whole days and thresholds are inclusive.
    pub fn valid_intervals(&self, span: TimeFrame) -> &[Interval] {
        let days = span.whole_days() as f64;
        self.tiers
            .iter()
            .find(|tier| days <= tier.max_days)
            .map_or(self.default.as_slice(), |tier| tier.intervals.as_slice())
    }

    /// Valid intervals narrowed to `requested` and coarser.
    ///
    /// When `requested` is not legal for `span` the whole valid set is
    /// returned so the caller can fall back to whatever the provider accepts.
    pub fn valid_intervals_for(&self, requested: Interval, span: TimeFrame) -> Vec<Interval> {
        let valid = self.valid_intervals(span);
        match valid.iter().position(|interval| *interval == requested) {
            Some(index) => valid[index..].to_vec(),
            None => valid.to_vec(),
        }
    }

    /// Candidate list tried in order by the fetcher.
    pub fn candidates(&self, choice: IntervalChoice, span: TimeFrame) -> Vec<Interval> {
        match choice {
            IntervalChoice::Auto => self.valid_intervals(span).to_vec(),
            IntervalChoice::Exact(interval) => self.valid_intervals_for(interval, span),
        }
    }

    /// Whether the provider serves `interval` for any lookback.
    pub fn supports(&self, interval: Interval) -> bool {
        self.default.contains(&interval)
            || self
                .tiers
                .iter()
                .any(|tier| tier.intervals.contains(&interval))
    }
}

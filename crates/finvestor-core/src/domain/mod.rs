//! # Domain Models
//!
//! Value types shared by the request builder, the provider adapters and the
//! router. All of them are immutable once constructed.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TimeFrame`] | Resolved time span parsed from `15m`, `1mo`, `P1D`, ... |
//! | [`Interval`] | Bar granularity (1m .. 3mo) |
//! | [`IntervalChoice`] | `auto` or an exact [`Interval`] |
//! | [`Period`] | Lookback: named range or arbitrary span |
//! | [`Bar`] | OHLCV observation, NaN for gaps |
//! | [`Bars`] | Non-empty bar sequence for one symbol |
//! | [`Asset`] | Ticker metadata |
//! | [`Symbol`] | Validated ticker |
//! | [`UtcDateTime`] | Timezone-aware instant held in UTC |

mod duration;
mod interval;
mod models;
mod period;
mod symbol;
mod timestamp;

pub use duration::{parse_duration, TimeFrame, DAYS_PER_MONTH, DAYS_PER_YEAR};
pub use interval::{Interval, IntervalChoice};
pub use models::{Asset, Bar, Bars};
pub use period::{Period, SymbolicPeriod};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;

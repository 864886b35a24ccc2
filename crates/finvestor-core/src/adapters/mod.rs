//! Provider adapters.
//!
//! | Adapter | Bars | Asset | Notes |
//! |---------|------|-------|-------|
//! | [`YahooAdapter`] | yes | yes | chart + quoteSummary JSON APIs |
//! | [`AlpacaAdapter`] | yes | no | key/secret headers, page-token loop |

mod alpaca;
mod yahoo;

pub use alpaca::AlpacaAdapter;
pub use yahoo::{extract_isin, YahooAdapter};

use crate::data_source::SourceError;
use crate::http_client::HttpError;

/// Maps a transport failure that survived retries.
fn transport_error(provider: &str, error: &HttpError) -> SourceError {
    if error.retryable() {
        SourceError::unavailable(format!("{provider} transport error: {}", error.message()))
    } else {
        SourceError::internal(format!("{provider} transport error: {}", error.message()))
    }
}

/// Maps a non-2xx status that survived retries.
fn status_error(provider: &str, status: u16, context: &str) -> SourceError {
    let message = format!("{provider} returned status {status} for {context}");
    match status {
        422 => SourceError::unprocessable_entity(message),
        429 => SourceError::rate_limited(message),
        _ => SourceError::unavailable(message),
    }
}

//! Interval negotiation and multi-ticker fan-out over one [`DataSource`].

use std::collections::BTreeMap;

use futures::future::try_join_all;

use crate::data_source::{DataSource, SourceError, SourceErrorKind};
use crate::normalize::normalize;
use crate::request::BarsRequest;
use crate::{Bars, Symbol, ValidationError};

/// Fetches bars for `request`, escalating through candidate intervals.
///
/// Candidates come from the source's validity table. `UnprocessableEntity`
/// and `EmptyBars` move on to the next candidate; any other error is
/// returned unchanged. When every candidate fails, a single failure is
/// returned as-is and several are aggregated into `IntervalsExhausted`.
pub async fn fetch_bars(
    source: &dyn DataSource,
    request: &BarsRequest,
) -> Result<Bars, SourceError> {
    let symbol = request.symbol();
    let candidates = source
        .validity_table()
        .candidates(request.interval(), request.span());
    if candidates.is_empty() {
        return Err(SourceError::invalid_request(format!(
            "{} has no valid interval for '{symbol}'",
            source.id()
        )));
    }

    let mut failures = Vec::new();
    for interval in candidates {
        let outcome = match source.fetch_ohlcv(request, interval).await {
            Ok(raw) => normalize(symbol.clone(), raw, interval),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(bars) => {
                if let Some(requested) = request.interval().exact().filter(|i| *i != interval) {
                    tracing::warn!(
                        %symbol,
                        %requested,
                        served = %interval,
                        "served bars at a coarser interval than requested"
                    );
                }
                return Ok(bars);
            }
            Err(error)
                if matches!(
                    error.kind(),
                    SourceErrorKind::UnprocessableEntity | SourceErrorKind::EmptyBars
                ) =>
            {
                tracing::warn!(
                    source = %source.id(),
                    %symbol,
                    %interval,
                    error = %error,
                    "interval rejected, trying next candidate"
                );
                failures.push((interval, error));
            }
            Err(error) => return Err(error),
        }
    }

    if failures.len() == 1 {
        if let Some((_, error)) = failures.pop() {
            return Err(error);
        }
    }
    Err(SourceError::intervals_exhausted(symbol, failures))
}

/// Fetches every symbol concurrently with the window of `request`.
///
/// Fan-out is unbounded and all-or-nothing: the first error aborts the
/// whole batch.
pub async fn fetch_many(
    source: &dyn DataSource,
    symbols: &[Symbol],
    request: &BarsRequest,
) -> Result<BTreeMap<Symbol, Bars>, SourceError> {
    let fetches = symbols.iter().map(|symbol| async move {
        let request = request.with_symbol(symbol.clone());
        let bars = fetch_bars(source, &request).await?;
        Ok::<_, SourceError>((symbol.clone(), bars))
    });

    Ok(try_join_all(fetches).await?.into_iter().collect())
}

/// Splits `"AAPL, msft,AAPL"` into unique symbols, keeping first-seen order.
pub fn parse_symbols(input: &str) -> Result<Vec<Symbol>, ValidationError> {
    let mut symbols: Vec<Symbol> = Vec::new();
    for raw in input.split(',').map(str::trim).filter(|raw| !raw.is_empty()) {
        let symbol = Symbol::parse(raw)?;
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }

    if symbols.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    Ok(symbols)
}

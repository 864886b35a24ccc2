use finvestor_core::{BarsRouter, Interval, Symbol, UtcDateTime};
use serde::Serialize;

use crate::cli::PriceArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct PriceData {
    symbol: Symbol,
    timestamp: UtcDateTime,
    price: f64,
}

pub async fn run(args: &PriceArgs, router: &BarsRouter) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.ticker)?;
    let timestamp = UtcDateTime::parse(&args.at)?;
    let interval: Interval = args.interval.parse()?;

    let route = router
        .get_price_at_timestamp(symbol.clone(), timestamp, interval)
        .await?;
    CommandResult::from_route(route.map(|price| PriceData {
        symbol,
        timestamp,
        price,
    }))
}

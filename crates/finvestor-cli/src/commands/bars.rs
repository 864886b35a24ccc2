use finvestor_core::{
    parse_symbols, BarsRequest, BarsRouter, IntervalChoice, Period, Symbol, UtcDateTime,
    ValidationError,
};

use crate::cli::BarsArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &BarsArgs, router: &BarsRouter) -> Result<CommandResult, CliError> {
    let (symbols, request) = build_request(args)?;

    if symbols.len() == 1 {
        let route = router.get_bars(&request).await?;
        return CommandResult::from_route(route);
    }

    let routes = router.get_bars_many(&symbols, &request).await?;
    CommandResult::from_routes(routes)
}

fn build_request(args: &BarsArgs) -> Result<(Vec<Symbol>, BarsRequest), CliError> {
    let symbols = parse_symbols(&args.tickers)?;
    let interval: IntervalChoice = args.interval.parse()?;

    let first = symbols.first().cloned().ok_or(ValidationError::EmptySymbol)?;

    let mut builder = BarsRequest::builder(first)
        .interval(interval)
        .include_prepost(args.include_prepost);
    if let Some(period) = &args.period {
        builder = builder.period(period.parse::<Period>()?);
    }
    if let Some(start) = &args.start {
        builder = builder.start(UtcDateTime::parse(start)?);
    }
    if let Some(end) = &args.end {
        builder = builder.end(UtcDateTime::parse(end)?);
    }

    Ok((symbols, builder.build()?))
}

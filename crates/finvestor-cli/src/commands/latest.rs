use finvestor_core::{BarsRouter, Interval, Symbol};

use crate::cli::LatestArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &LatestArgs, router: &BarsRouter) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.ticker)?;
    let interval: Interval = args.interval.parse()?;

    let route = router.get_latest_bar(symbol, interval).await?;
    CommandResult::from_route(route)
}

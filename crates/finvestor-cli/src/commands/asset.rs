use finvestor_core::{BarsRouter, Symbol};

use crate::cli::AssetArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &AssetArgs, router: &BarsRouter) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.ticker)?;

    let route = router.get_asset(&symbol).await?;
    CommandResult::from_route(route)
}

mod activity;
mod asset;
mod bars;
mod latest;
mod price;

use std::collections::BTreeMap;
use std::sync::Arc;

use finvestor_core::{
    BarsRouter, ConfigError, FallbackReason, FinvestorConfig, ProviderId, ReqwestHttpClient,
    RouteSuccess, Symbol,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Routing metadata printed next to the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    pub source_chain: Vec<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub latency_ms: u64,
}

pub struct CommandResult {
    pub data: Value,
    pub meta: Meta,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            meta: Meta::default(),
        }
    }

    pub fn from_route<T: Serialize>(route: RouteSuccess<T>) -> Result<Self, CliError> {
        Ok(Self {
            data: serde_json::to_value(&route.data)?,
            meta: Meta {
                source_chain: route.source_chain,
                fallback: route.fallback,
                warnings: route.warnings,
                latency_ms: route.latency_ms,
            },
        })
    }

    /// Per-ticker map; each entry keeps its own routing metadata.
    pub fn from_routes<T: Serialize>(
        routes: BTreeMap<Symbol, RouteSuccess<T>>,
    ) -> Result<Self, CliError> {
        let mut meta = Meta::default();
        for (symbol, route) in &routes {
            for provider in &route.source_chain {
                if !meta.source_chain.contains(provider) {
                    meta.source_chain.push(*provider);
                }
            }
            meta.warnings.extend(
                route
                    .warnings
                    .iter()
                    .map(|warning| format!("{symbol}: {warning}")),
            );
            meta.latency_ms = meta.latency_ms.max(route.latency_ms);
        }

        Ok(Self {
            data: serde_json::to_value(&routes)?,
            meta,
        })
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Bars(args) => bars::run(args, &router(cli)?).await,
        Command::Latest(args) => latest::run(args, &router(cli)?).await,
        Command::Price(args) => price::run(args, &router(cli)?).await,
        Command::Asset(args) => asset::run(args, &router(cli)?).await,
        Command::Activity(args) => activity::run(args),
    }
}

fn router(cli: &Cli) -> Result<BarsRouter, CliError> {
    let config = load_config(cli, |key| std::env::var(key).ok())?;
    tracing::debug!(provider = %config.provider, "loaded configuration");
    Ok(BarsRouter::from_config(
        &config,
        Arc::new(ReqwestHttpClient::new()),
    ))
}

/// Environment configuration with the global flags layered on top.
fn load_config<F>(cli: &Cli, lookup: F) -> Result<FinvestorConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = cli.provider.map(|selector| ProviderId::from(selector).to_string());
    let timeout_ms = cli.timeout_ms.map(|timeout| timeout.to_string());

    FinvestorConfig::from_lookup(|key| match key {
        "FINVESTOR_DATA_PROVIDER" if provider.is_some() => provider.clone(),
        "FINVESTOR_HTTP_TIMEOUT_MS" if timeout_ms.is_some() => timeout_ms.clone(),
        _ => lookup(key),
    })
}

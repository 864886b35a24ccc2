//! Runtime configuration.
//!
//! [`FinvestorConfig::from_env`] reads the process environment;
//! [`FinvestorConfig::from_lookup`] takes any key lookup so tests never touch
//! process-global state.
//!
//! # Environment Variables
//!
//! | Key | Default |
//! |-----|---------|
//! | `FINVESTOR_DATA_PROVIDER` | `yahoo` |
//! | `YAHOO_FINANCE_BASE_URL` | `https://query2.finance.yahoo.com` |
//! | `FINVESTOR_ISIN_LOOKUP_URL` | Business Insider `SearchController_Suggest` |
//! | `ALPACA_DATA_URL` | `https://data.alpaca.markets` |
//! | `ALPACA_API_KEY_ID` / `ALPACA_API_SECRET_KEY` | unset |
//! | `ALPACA_HISTORICAL_DATA_DELAY` | `0` |
//! | `ALPACA_HISTORICAL_DELAY_POLICY` | `reject` |
//! | `FINVESTOR_HTTP_TIMEOUT_MS` | `10000` |
//! | `FINVESTOR_MAX_RETRIES` | `4` |

use std::fmt::{Debug, Formatter};

use thiserror::Error;

use crate::http_client::HttpAuth;
use crate::request::{HistoricalDelay, HistoricalDelayPolicy};
use crate::retry::RetryConfig;
use crate::{parse_duration, ProviderId};

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_ISIN_LOOKUP_URL: &str =
    "https://markets.businessinsider.com/ajax/SearchController_Suggest";
pub const DEFAULT_ALPACA_DATA_URL: &str = "https://data.alpaca.markets";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("provider 'alpaca' requires ALPACA_API_KEY_ID and ALPACA_API_SECRET_KEY")]
    MissingAlpacaCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YahooConfig {
    pub base_url: String,
    pub isin_lookup_url: String,
    pub timeout_ms: u64,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_YAHOO_BASE_URL),
            isin_lookup_url: String::from(DEFAULT_ISIN_LOOKUP_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Alpaca key id and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AlpacaCredentials {
    key_id: String,
    secret_key: String,
}

impl AlpacaCredentials {
    pub fn new(key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn auth(&self) -> HttpAuth {
        HttpAuth::Headers(vec![
            (String::from("APCA-API-KEY-ID"), self.key_id.clone()),
            (String::from("APCA-API-SECRET-KEY"), self.secret_key.clone()),
        ])
    }
}

impl Debug for AlpacaCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaCredentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlpacaConfig {
    pub data_url: String,
    /// Alpaca is only usable when both keys are configured.
    pub credentials: Option<AlpacaCredentials>,
    pub historical_delay: HistoricalDelay,
    pub timeout_ms: u64,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            data_url: String::from(DEFAULT_ALPACA_DATA_URL),
            credentials: None,
            historical_delay: HistoricalDelay::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Top-level configuration consumed by [`crate::BarsRouter::from_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinvestorConfig {
    /// Primary bar provider. Alpaca falls back to Yahoo.
    pub provider: ProviderId,
    pub yahoo: YahooConfig,
    pub alpaca: AlpacaConfig,
    pub retry: RetryConfig,
}

impl Default for FinvestorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderId::Yahoo,
            yahoo: YahooConfig::default(),
            alpaca: AlpacaConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl FinvestorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(value) = get("FINVESTOR_DATA_PROVIDER") {
            config.provider = value.parse().map_err(|error: crate::ValidationError| {
                invalid("FINVESTOR_DATA_PROVIDER", &value, error)
            })?;
        }

        if let Some(value) = get("YAHOO_FINANCE_BASE_URL") {
            config.yahoo.base_url = trim_url(value);
        }
        if let Some(value) = get("FINVESTOR_ISIN_LOOKUP_URL") {
            config.yahoo.isin_lookup_url = trim_url(value);
        }
        if let Some(value) = get("ALPACA_DATA_URL") {
            config.alpaca.data_url = trim_url(value);
        }

        config.alpaca.credentials = match (get("ALPACA_API_KEY_ID"), get("ALPACA_API_SECRET_KEY")) {
            (Some(key_id), Some(secret_key)) => Some(AlpacaCredentials::new(key_id, secret_key)),
            _ => None,
        };

        if let Some(value) = get("ALPACA_HISTORICAL_DATA_DELAY") {
            let delay = parse_duration(&value)
                .map_err(|error| invalid("ALPACA_HISTORICAL_DATA_DELAY", &value, error))?;
            if delay.is_negative() {
                return Err(invalid("ALPACA_HISTORICAL_DATA_DELAY", &value, "must not be negative"));
            }
            config.alpaca.historical_delay.delay = delay;
        }
        if let Some(value) = get("ALPACA_HISTORICAL_DELAY_POLICY") {
            config.alpaca.historical_delay.policy = HistoricalDelayPolicy::parse(&value)
                .ok_or_else(|| {
                    invalid("ALPACA_HISTORICAL_DELAY_POLICY", &value, "expected reject or clamp")
                })?;
        }

        if let Some(value) = get("FINVESTOR_HTTP_TIMEOUT_MS") {
            let timeout_ms = value
                .parse::<u64>()
                .ok()
                .filter(|timeout| *timeout > 0)
                .ok_or_else(|| {
                    invalid("FINVESTOR_HTTP_TIMEOUT_MS", &value, "expected a positive integer")
                })?;
            config.set_timeout_ms(timeout_ms);
        }
        if let Some(value) = get("FINVESTOR_MAX_RETRIES") {
            config.retry.max_retries = value.parse().map_err(|error: std::num::ParseIntError| {
                invalid("FINVESTOR_MAX_RETRIES", &value, error)
            })?;
        }

        if config.provider == ProviderId::Alpaca && config.alpaca.credentials.is_none() {
            return Err(ConfigError::MissingAlpacaCredentials);
        }

        Ok(config)
    }

    /// Applies one per-request timeout to every provider.
    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.yahoo.timeout_ms = timeout_ms;
        self.alpaca.timeout_ms = timeout_ms;
    }
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}

fn trim_url(value: String) -> String {
    value.trim_end_matches('/').to_owned()
}

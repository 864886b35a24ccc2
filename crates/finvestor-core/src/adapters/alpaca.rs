use std::sync::Arc;

use serde::Deserialize;

use super::{status_error, transport_error};
use crate::config::{AlpacaConfig, AlpacaCredentials};
use crate::data_source::{
    CapabilitySet, DataSource, FallbackReason, RawOhlcv, SourceError, SourceFuture,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::request::{BarsRequest, HistoricalDelay, HistoricalDelayPolicy, Window};
use crate::retry::{send_with_retry, RetryConfig};
use crate::validity::IntervalValidityTable;
use crate::{Interval, ProviderId, Symbol, UtcDateTime};

/// Alpaca market data adapter (stocks and crypto bars).
#[derive(Clone)]
pub struct AlpacaAdapter {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    data_url: String,
    timeout_ms: u64,
    historical_delay: HistoricalDelay,
    retry: RetryConfig,
    validity: IntervalValidityTable,
}

impl AlpacaAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        config: &AlpacaConfig,
        credentials: &AlpacaCredentials,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http_client,
            auth: credentials.auth(),
            data_url: config.data_url.clone(),
            timeout_ms: config.timeout_ms,
            historical_delay: config.historical_delay,
            retry,
            validity: IntervalValidityTable::alpaca(),
        }
    }

    /// Crypto pairs (`BTC-USD`) live under the crypto API without the dash.
    fn bars_url(&self, symbol: &Symbol) -> String {
        if symbol.is_crypto_pair() {
            format!(
                "{}/v1beta1/crypto/{}/bars",
                self.data_url,
                symbol.as_str().replace('-', "")
            )
        } else {
            format!(
                "{}/v2/stocks/{}/bars",
                self.data_url,
                urlencoding::encode(symbol.as_str())
            )
        }
    }

    async fn fetch_pages(
        &self,
        req: &BarsRequest,
        interval: Interval,
    ) -> Result<RawOhlcv, SourceError> {
        let symbol = req.symbol();
        let first = req.alpaca_params(interval, &self.historical_delay)?;
        let url = self.bars_url(symbol);

        let mut params = first.clone();
        let mut raw = RawOhlcv::default();
        let mut page = 0_u32;
        loop {
            let request = HttpRequest::get(url.clone())
                .with_auth(&self.auth)
                .with_timeout_ms(self.timeout_ms)
                .with_query(params.query_pairs());

            tracing::debug!(provider = "alpaca", %symbol, %interval, page, "fetching bars page");
            let response = send_with_retry(self.http_client.as_ref(), request, &self.retry)
                .await
                .map_err(|error| transport_error("alpaca", &error))?;

            if !response.is_success() {
                return Err(status_error(
                    "alpaca",
                    response.status,
                    &format!("'{symbol}' at timeframe {}", first.timeframe),
                ));
            }

            let body: AlpacaBarsResponse = serde_json::from_str(&response.body)
                .map_err(|e| SourceError::internal(format!("failed to parse alpaca bars: {e}")))?;

            for bar in body.bars.unwrap_or_default() {
                raw.timestamps.push(bar.t.unix_timestamp());
                raw.open.push(bar.o);
                raw.high.push(bar.h);
                raw.low.push(bar.l);
                raw.close.push(bar.c);
                raw.volume.push(bar.v);
            }

            match body.next_page_token {
                Some(token) if !token.is_empty() => {
                    params = first.with_page_token(token);
                    page += 1;
                }
                _ => break,
            }
        }

        if raw.is_empty() {
            return Err(SourceError::empty_bars(format!(
                "alpaca returned no bars for '{symbol}' at timeframe {}",
                first.timeframe
            )));
        }
        Ok(raw)
    }
}

impl DataSource for AlpacaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alpaca
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::bars_only()
    }

    fn validity_table(&self) -> &IntervalValidityTable {
        &self.validity
    }

    fn check_request(&self, request: &BarsRequest) -> Option<FallbackReason> {
        if let Some(interval) = request.interval().exact() {
            if !self.validity.supports(interval) {
                return Some(FallbackReason::UnsupportedInterval);
            }
        }

        if let Window::Range { start, end } = request.window() {
            let now = request.issued_at();
            // An open end is checked at the finest candidate; coarser ones end later.
            let end = end
                .or_else(|| {
                    let candidates = self.validity.candidates(request.interval(), request.span());
                    candidates.first().and_then(|interval| request.end_for(*interval))
                })
                .unwrap_or(start);
            let delay = &self.historical_delay;
            let clampable = delay.policy == HistoricalDelayPolicy::Clamp
                && !delay.embargoes(start, now);
            if delay.embargoes(end, now) && !clampable {
                return Some(FallbackReason::HistoricalDelay);
            }
        }
        None
    }

    fn fetch_ohlcv<'a>(
        &'a self,
        request: &'a BarsRequest,
        interval: Interval,
    ) -> SourceFuture<'a, RawOhlcv> {
        Box::pin(self.fetch_pages(request, interval))
    }
}

// ============================================================================
// Alpaca API response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct AlpacaBarsResponse {
    #[serde(default)]
    bars: Option<Vec<AlpacaBar>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: UtcDateTime,
    #[serde(default)]
    o: Option<f64>,
    #[serde(default)]
    h: Option<f64>,
    #[serde(default)]
    l: Option<f64>,
    #[serde(default)]
    c: Option<f64>,
    #[serde(default)]
    v: Option<f64>,
}

use std::sync::Arc;

use serde::Deserialize;

use super::{status_error, transport_error};
use crate::config::YahooConfig;
use crate::data_source::{
    CapabilitySet, DataSource, RawOhlcv, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::request::BarsRequest;
use crate::retry::{send_with_retry, RetryConfig};
use crate::validity::IntervalValidityTable;
use crate::{Asset, Interval, ProviderId, Symbol};

const USER_AGENTS: [&str; 4] = [
    concat!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    concat!(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    concat!(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    concat!(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 ",
        "(KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    ),
];

const QUOTE_SUMMARY_MODULES: &str = "quoteType,summaryProfile,price";

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Yahoo Finance chart and quoteSummary adapter.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    config: YahooConfig,
    retry: RetryConfig,
    validity: IntervalValidityTable,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::new(
            Arc::new(ReqwestHttpClient::new()),
            YahooConfig::default(),
            RetryConfig::default(),
        )
    }
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, config: YahooConfig, retry: RetryConfig) -> Self {
        Self {
            http_client,
            config,
            retry,
            validity: IntervalValidityTable::yahoo(),
        }
    }

    fn get(&self, url: String) -> HttpRequest {
        let user_agent = USER_AGENTS[fastrand::usize(..USER_AGENTS.len())];
        HttpRequest::get(url)
            .with_header("user-agent", user_agent)
            .with_timeout_ms(self.config.timeout_ms)
    }

    async fn fetch_chart(
        &self,
        req: &BarsRequest,
        interval: Interval,
    ) -> Result<RawOhlcv, SourceError> {
        let symbol = req.symbol();
        let params = req.yahoo_params(interval);
        let request = self
            .get(format!(
                "{}/v8/finance/chart/{}",
                self.config.base_url,
                urlencoding::encode(symbol.as_str())
            ))
            .with_query(params.query_pairs());

        tracing::debug!(provider = "yahoo", %symbol, %interval, "fetching chart");
        let response = send_with_retry(self.http_client.as_ref(), request, &self.retry)
            .await
            .map_err(|error| transport_error("yahoo", &error))?;

        if !response.is_success() {
            return Err(status_error(
                "yahoo",
                response.status,
                &format!("'{symbol}' at interval {interval}"),
            ));
        }

        let chart: YahooChartResponse = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;

        if let Some(error) = chart.chart.error {
            return Err(SourceError::unavailable(format!(
                "yahoo chart API error: {}",
                error.description()
            )));
        }

        let result = chart
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::internal("no chart data in response"))?;

        let timestamps = result.timestamp.unwrap_or_default();
        if timestamps.is_empty() {
            return Err(SourceError::empty_bars(format!(
                "yahoo returned no bars for '{symbol}' at interval {interval}"
            )));
        }

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::internal("no quote data"))?;

        Ok(RawOhlcv {
            timestamps,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            volume: quote.volume,
        })
    }

    async fn fetch_asset(&self, symbol: &Symbol) -> Result<Asset, SourceError> {
        let request = self
            .get(format!(
                "{}/v10/finance/quoteSummary/{}",
                self.config.base_url,
                urlencoding::encode(symbol.as_str())
            ))
            .with_query([("modules", QUOTE_SUMMARY_MODULES)]);

        tracing::debug!(provider = "yahoo", %symbol, "fetching quote summary");
        let response = send_with_retry(self.http_client.as_ref(), request, &self.retry)
            .await
            .map_err(|error| transport_error("yahoo", &error))?;

        if !response.is_success() {
            let context = format!("'{symbol}' quote summary");
            return Err(status_error("yahoo", response.status, &context));
        }

        let summary: YahooQuoteSummaryResponse = serde_json::from_str(&response.body)
            .map_err(|e| {
                SourceError::internal(format!("failed to parse yahoo quote summary: {e}"))
            })?;

        if let Some(error) = summary.quote_summary.error {
            return Err(SourceError::unavailable(format!(
                "yahoo quote summary error: {}",
                error.description()
            )));
        }

        let result = summary
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::internal("no quote summary in response"))?;

        let mut asset = result.into_asset(symbol.clone());
        if asset.asset_type.as_deref() == Some("EQUITY") {
            asset.isin = self.lookup_isin(symbol).await;
        }
        Ok(asset)
    }

    /// Best-effort ISIN lookup; failures are logged and yield `None`.
    async fn lookup_isin(&self, symbol: &Symbol) -> Option<String> {
        if symbol.as_str().contains(['-', '^']) {
            return None;
        }

        let request = self
            .get(self.config.isin_lookup_url.clone())
            .with_query([("max_results", "25"), ("query", symbol.as_str())]);

        match send_with_retry(self.http_client.as_ref(), request, &self.retry).await {
            Ok(response) if response.is_success() => extract_isin(&response.body, symbol.as_str()),
            Ok(response) => {
                tracing::debug!(%symbol, status = response.status, "isin lookup failed");
                None
            }
            Err(error) => {
                tracing::debug!(%symbol, %error, "isin lookup failed");
                None
            }
        }
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn validity_table(&self) -> &IntervalValidityTable {
        &self.validity
    }

    fn fetch_ohlcv<'a>(
        &'a self,
        request: &'a BarsRequest,
        interval: Interval,
    ) -> SourceFuture<'a, RawOhlcv> {
        Box::pin(self.fetch_chart(request, interval))
    }

    fn asset<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Asset> {
        Box::pin(self.fetch_asset(symbol))
    }
}

/// First 12-character `|`-field starting with two letters in the record for
/// `ticker`. A `-` placeholder counts as absent.
pub fn extract_isin(body: &str, ticker: &str) -> Option<String> {
    let marker = format!("\"{ticker}|");
    let start = body.find(&marker)? + marker.len();
    let record = body[start..].split('"').next()?;

    record
        .split('|')
        .map(str::trim)
        .filter(|field| *field != "-")
        .find(|field| {
            field.len() == 12
                && field.is_ascii()
                && field.chars().take(2).all(|c| c.is_ascii_alphabetic())
        })
        .map(str::to_owned)
}

// ============================================================================
// Yahoo Finance API response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct YahooApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl YahooApiError {
    fn description(&self) -> &str {
        self.description
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or("unknown error")
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: YahooChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: YahooQuoteSummaryData,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryData {
    #[serde(default)]
    result: Option<Vec<YahooQuoteSummaryResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryResult {
    #[serde(rename = "quoteType", default)]
    quote_type: Option<YahooQuoteType>,
    #[serde(rename = "summaryProfile", default)]
    summary_profile: Option<YahooSummaryProfile>,
    #[serde(default)]
    price: Option<YahooPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteType {
    quote_type: Option<String>,
    exchange: Option<String>,
    market: Option<String>,
    exchange_timezone_name: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooSummaryProfile {
    name: Option<String>,
    country: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooPrice {
    currency: Option<String>,
}

impl YahooQuoteSummaryResult {
    fn into_asset(self, ticker: Symbol) -> Asset {
        let quote_type = self.quote_type.unwrap_or_default();
        let profile = self.summary_profile.unwrap_or_default();
        let price = self.price.unwrap_or_default();

        Asset {
            ticker,
            name: quote_type.long_name.or(quote_type.short_name).or(profile.name),
            asset_type: quote_type.quote_type,
            currency: price.currency,
            exchange: quote_type.exchange,
            exchange_timezone: quote_type.exchange_timezone_name,
            market: quote_type.market,
            isin: None,
            country: profile.country,
            sector: profile.sector,
            industry: profile.industry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::test_support::{at, symbol, ScriptedHttpClient};
    use crate::SymbolicPeriod;

    fn adapter(client: Arc<ScriptedHttpClient>) -> YahooAdapter {
        let config = YahooConfig {
            base_url: String::from("https://yahoo.test"),
            isin_lookup_url: String::from("https://isin.test/suggest"),
            timeout_ms: 1_000,
        };
        YahooAdapter::new(client, config, RetryConfig::no_retry())
    }

    fn request() -> BarsRequest {
        BarsRequest::builder(symbol("AAPL"))
            .period(SymbolicPeriod::FiveDays)
            .build_at(at("2024-03-15T12:00:00Z"))
            .expect("valid request")
    }

    const CHART: &str = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},
        "timestamp":[1710162000,1710165600],
        "indicators":{"quote":[{"open":[170.1,null],"high":[171.0,172.0],
        "low":[169.5,170.2],"close":[170.8,171.9],"volume":[1200,null]}]}}],"error":null}}"#;

    #[tokio::test]
    async fn chart_request_carries_path_query_and_browser_agent() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(CHART))]));
        let raw = adapter(client.clone())
            .fetch_ohlcv(&request(), Interval::OneHour)
            .await
            .expect("chart");

        assert_eq!(raw.timestamps, vec![1_710_162_000, 1_710_165_600]);
        assert_eq!(raw.open, vec![Some(170.1), None]);
        assert_eq!(raw.volume, vec![Some(1_200.0), None]);

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://yahoo.test/v8/finance/chart/AAPL");
        assert_eq!(requests[0].query_value("range"), Some("5d"));
        assert_eq!(requests[0].query_value("interval"), Some("1h"));
        assert_eq!(requests[0].query_value("events"), Some("div,splits"));
        assert_eq!(requests[0].timeout_ms, 1_000);
        assert!(requests[0]
            .headers
            .get("user-agent")
            .is_some_and(|agent| agent.starts_with("Mozilla/5.0")));
    }

    #[tokio::test]
    async fn status_422_is_unprocessable() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::new(
            422,
            r#"{"chart":{"result":null,"error":{"code":"Unprocessable Entity"}}}"#,
        ))]));

        let error = adapter(client)
            .fetch_ohlcv(&request(), Interval::OneMinute)
            .await
            .expect_err("422");
        assert_eq!(error.kind(), SourceErrorKind::UnprocessableEntity);
    }

    #[tokio::test]
    async fn missing_timestamps_are_empty_bars() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(body))]));

        let error = adapter(client)
            .fetch_ohlcv(&request(), Interval::OneDay)
            .await
            .expect_err("empty");
        assert_eq!(error.kind(), SourceErrorKind::EmptyBars);
    }

    #[tokio::test]
    async fn chart_error_and_missing_result_are_distinguished() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(
                r#"{"chart":{"result":null,"error":{"code":"Not Found",
                    "description":"No data found, symbol may be delisted"}}}"#,
            )),
            Ok(HttpResponse::ok_json(r#"{"chart":{"result":[],"error":null}}"#)),
        ]));
        let yahoo = adapter(client);

        let error = yahoo
            .fetch_ohlcv(&request(), Interval::OneDay)
            .await
            .expect_err("api error");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("symbol may be delisted"));

        let error = yahoo
            .fetch_ohlcv(&request(), Interval::OneDay)
            .await
            .expect_err("no result");
        assert_eq!(error.kind(), SourceErrorKind::Internal);
        assert_eq!(error.message(), "no chart data in response");
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Err(HttpError::new(
            "request timeout",
        ))]));

        let error = adapter(client)
            .fetch_ohlcv(&request(), Interval::OneDay)
            .await
            .expect_err("timeout");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.retryable());
    }

    const SUMMARY: &str = r#"{"quoteSummary":{"result":[{
        "quoteType":{"quoteType":"EQUITY","exchange":"NMS","market":"us_market",
            "exchangeTimezoneName":"America/New_York","longName":"Apple Inc.","shortName":"Apple"},
        "summaryProfile":{"country":"United States","sector":"Technology",
            "industry":"Consumer Electronics"},
        "price":{"currency":"USD"}}],"error":null}}"#;

    #[tokio::test]
    async fn asset_combines_summary_modules_and_isin() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(SUMMARY)),
            Ok(HttpResponse::ok_json(
                concat!(
                    r#"mmSuggestDeliver(0, new Array("Name", "Category", "Keywords"), "#,
                    r#"new Array(new Array("Apple Inc.", "Stocks", "#,
                    r#""AAPL|US0378331005|AAPL||AAPL")), "#,
                    r#"1, 0);"#,
                ),
            )),
        ]));

        let asset = adapter(client.clone())
            .asset(&symbol("AAPL"))
            .await
            .expect("asset");

        assert_eq!(asset.name.as_deref(), Some("Apple Inc."));
        assert_eq!(asset.asset_type.as_deref(), Some("EQUITY"));
        assert_eq!(asset.exchange.as_deref(), Some("NMS"));
        assert_eq!(asset.exchange_timezone.as_deref(), Some("America/New_York"));
        assert_eq!(asset.currency.as_deref(), Some("USD"));
        assert_eq!(asset.sector.as_deref(), Some("Technology"));
        assert_eq!(asset.isin.as_deref(), Some("US0378331005"));

        let requests = client.recorded_requests();
        assert_eq!(requests[0].url, "https://yahoo.test/v10/finance/quoteSummary/AAPL");
        assert_eq!(requests[0].query_value("modules"), Some(QUOTE_SUMMARY_MODULES));
        assert_eq!(requests[1].url, "https://isin.test/suggest");
        assert_eq!(requests[1].query_value("query"), Some("AAPL"));
    }

    #[tokio::test]
    async fn isin_failure_does_not_fail_the_asset() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(SUMMARY)),
            Ok(HttpResponse::new(500, "oops")),
        ]));

        let asset = adapter(client).asset(&symbol("AAPL")).await.expect("asset");
        assert_eq!(asset.isin, None);
        assert_eq!(asset.name.as_deref(), Some("Apple Inc."));
    }

    #[tokio::test]
    async fn non_equity_skips_isin_lookup() {
        let body = SUMMARY.replace("\"EQUITY\"", "\"ETF\"");
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(body))]));

        let asset = adapter(client.clone())
            .asset(&symbol("SPY"))
            .await
            .expect("asset");
        assert_eq!(asset.isin, None);
        assert_eq!(client.recorded_requests().len(), 1);
    }

    #[test]
    fn extracts_isin_from_suggest_record() {
        let body = concat!(
            r#"new Array("Apple", "Stocks", "AAPL|US0378331005|AAPL||AAPL"), "#,
            r#"new Array("x", "y", "AAPLX|-|AAPLX")"#,
        );
        assert_eq!(extract_isin(body, "AAPL").as_deref(), Some("US0378331005"));
        assert_eq!(extract_isin(body, "AAPLX"), None);
        assert_eq!(extract_isin(body, "MSFT"), None);
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use serde::Serialize;

use crate::adapters::{AlpacaAdapter, YahooAdapter};
use crate::config::FinvestorConfig;
use crate::data_source::{DataSource, Endpoint, FallbackReason, SourceError};
use crate::fetch::fetch_bars;
use crate::http_client::HttpClient;
use crate::request::BarsRequest;
use crate::{Asset, Bar, Bars, CoreError, Interval, Period, ProviderId, Symbol, UtcDateTime};

/// Successful routed call.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSuccess<T> {
    pub data: T,
    pub selected_source: ProviderId,
    pub source_chain: Vec<ProviderId>,
    pub fallback: Option<FallbackReason>,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
}

impl<T> RouteSuccess<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RouteSuccess<U> {
        RouteSuccess {
            data: f(self.data),
            selected_source: self.selected_source,
            source_chain: self.source_chain,
            fallback: self.fallback,
            warnings: self.warnings,
            latency_ms: self.latency_ms,
        }
    }
}

/// Position of a bars call in the primary → secondary state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStep {
    TryPrimary,
    PrimaryUnusable(FallbackReason),
    TrySecondary(FallbackReason),
}

/// Primary source with an optional secondary used when the primary is unusable.
///
/// The primary is asked once. It is skipped without I/O when
/// [`DataSource::check_request`] names a reason, and abandoned when it
/// returns only empty results. Any other primary error is final.
pub struct BarsRouter {
    primary: Arc<dyn DataSource>,
    secondary: Option<Arc<dyn DataSource>>,
}

impl BarsRouter {
    pub fn new(primary: Arc<dyn DataSource>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn DataSource>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Yahoo alone, or Alpaca backed by Yahoo when Alpaca is the configured
    /// provider and credentials are present.
    pub fn from_config(config: &FinvestorConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let yahoo: Arc<dyn DataSource> = Arc::new(YahooAdapter::new(
            Arc::clone(&http_client),
            config.yahoo.clone(),
            config.retry.clone(),
        ));

        match (config.provider, config.alpaca.credentials.as_ref()) {
            (ProviderId::Alpaca, Some(credentials)) => {
                let alpaca = AlpacaAdapter::new(
                    http_client,
                    &config.alpaca,
                    credentials,
                    config.retry.clone(),
                );
                Self::new(Arc::new(alpaca)).with_secondary(yahoo)
            }
            (ProviderId::Alpaca, None) => {
                tracing::warn!("alpaca selected without credentials, using yahoo only");
                Self::new(yahoo)
            }
            (ProviderId::Yahoo, _) => Self::new(yahoo),
        }
    }

    pub fn primary(&self) -> ProviderId {
        self.primary.id()
    }

    pub fn secondary(&self) -> Option<ProviderId> {
        self.secondary.as_ref().map(|source| source.id())
    }

    pub async fn get_bars(&self, request: &BarsRequest) -> Result<RouteSuccess<Bars>, SourceError> {
        let started = Instant::now();
        let mut source_chain = Vec::with_capacity(2);
        let mut step = RouteStep::TryPrimary;

        loop {
            step = match step {
                RouteStep::TryPrimary => {
                    let primary = self.primary.as_ref();
                    source_chain.push(primary.id());

                    let precheck = self
                        .secondary
                        .as_ref()
                        .and_then(|_| primary.check_request(request));
                    if let Some(reason) = precheck {
                        RouteStep::PrimaryUnusable(reason)
                    } else {
                        match fetch_bars(primary, request).await {
                            Ok(bars) => {
                                return Ok(RouteSuccess {
                                    data: bars,
                                    selected_source: primary.id(),
                                    source_chain,
                                    fallback: None,
                                    warnings: Vec::new(),
                                    latency_ms: elapsed_ms(started),
                                });
                            }
                            Err(error) if error.is_empty_result() && self.secondary.is_some() => {
                                RouteStep::PrimaryUnusable(FallbackReason::Empty)
                            }
                            Err(error) => return Err(error),
                        }
                    }
                }
                RouteStep::PrimaryUnusable(reason) => {
                    tracing::info!(
                        primary = %self.primary.id(),
                        symbol = %request.symbol(),
                        %reason,
                        "primary source unusable, falling back"
                    );
                    RouteStep::TrySecondary(reason)
                }
                RouteStep::TrySecondary(reason) => {
                    let Some(secondary) = self.secondary.as_deref() else {
                        return Err(SourceError::internal(
                            "fallback requested without a secondary source",
                        ));
                    };
                    source_chain.push(secondary.id());

                    let bars = fetch_bars(secondary, request).await.map_err(|error| {
                        tracing::warn!(
                            secondary = %secondary.id(),
                            symbol = %request.symbol(),
                            error = %error,
                            "secondary source failed"
                        );
                        error
                    })?;

                    return Ok(RouteSuccess {
                        data: bars,
                        selected_source: secondary.id(),
                        source_chain,
                        fallback: Some(reason),
                        warnings: vec![format!(
                            "source fallback succeeded with '{}' after '{}' was unusable \
                             ({reason})",
                            secondary.id(),
                            self.primary.id()
                        )],
                        latency_ms: elapsed_ms(started),
                    });
                }
            };
        }
    }

    /// Routes each symbol independently and concurrently; the first error
    /// aborts the batch.
    pub async fn get_bars_many(
        &self,
        symbols: &[Symbol],
        request: &BarsRequest,
    ) -> Result<BTreeMap<Symbol, RouteSuccess<Bars>>, SourceError> {
        let calls = symbols.iter().map(|symbol| async move {
            let request = request.with_symbol(symbol.clone());
            let routed = self.get_bars(&request).await?;
            Ok::<_, SourceError>((symbol.clone(), routed))
        });

        Ok(try_join_all(calls).await?.into_iter().collect())
    }

    pub async fn get_asset(&self, symbol: &Symbol) -> Result<RouteSuccess<Asset>, SourceError> {
        let started = Instant::now();
        let source = std::iter::once(&self.primary)
            .chain(self.secondary.iter())
            .find(|source| source.capabilities().supports(Endpoint::Asset))
            .ok_or_else(|| SourceError::unsupported_endpoint(Endpoint::Asset))?;

        let asset = source.asset(symbol).await?;
        Ok(RouteSuccess {
            data: asset,
            selected_source: source.id(),
            source_chain: vec![source.id()],
            fallback: None,
            warnings: Vec::new(),
            latency_ms: elapsed_ms(started),
        })
    }

    /// Most recent bar over the shortest lookback that fits `interval`.
    pub async fn get_latest_bar(
        &self,
        symbol: Symbol,
        interval: Interval,
    ) -> Result<RouteSuccess<Bar>, CoreError> {
        let request = BarsRequest::builder(symbol)
            .period(Period::for_interval(interval))
            .interval(interval)
            .build()?;

        let routed = self.get_bars(&request).await?;
        Ok(routed.map(|bars| *bars.last()))
    }

    /// First bar of a window opening at `ts` and spanning five intervals.
    pub async fn get_bar_at_timestamp(
        &self,
        symbol: Symbol,
        ts: UtcDateTime,
        interval: Interval,
    ) -> Result<RouteSuccess<Bar>, CoreError> {
        let start = ts.truncate_to_minute();
        let window = interval
            .duration()
            .checked_mul(5)
            .map_or(time::Duration::MAX, |span| span.duration());
        let request = BarsRequest::builder(symbol)
            .start(start)
            .end(start.saturating_add(window))
            .interval(interval)
            .build()?;

        let routed = self.get_bars(&request).await?;
        Ok(routed.map(|bars| *bars.first()))
    }

    pub async fn get_price_at_timestamp(
        &self,
        symbol: Symbol,
        ts: UtcDateTime,
        interval: Interval,
    ) -> Result<RouteSuccess<f64>, CoreError> {
        let routed = self.get_bar_at_timestamp(symbol, ts, interval).await?;
        Ok(routed.map(|bar| price_at_timestamp(&bar, ts)))
    }
}

/// Open when `ts` is at least as close to the bar's open as to its close,
/// otherwise close.
pub fn price_at_timestamp(bar: &Bar, ts: UtcDateTime) -> f64 {
    let since_open = ts - bar.ts;
    let until_close = bar.close_ts() - ts;
    if since_open <= until_close {
        bar.open
    } else {
        bar.close
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    let elapsed = started.elapsed().as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::data_source::{CapabilitySet, RawOhlcv, SourceErrorKind, SourceFuture};
    use crate::test_support::{at, symbol};
    use crate::validity::IntervalValidityTable;
    use crate::SymbolicPeriod;

    struct StubSource {
        id: ProviderId,
        table: IntervalValidityTable,
        precheck: Option<FallbackReason>,
        answer: fn() -> Result<RawOhlcv, SourceError>,
        with_asset: bool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(id: ProviderId, answer: fn() -> Result<RawOhlcv, SourceError>) -> Self {
            Self {
                id,
                table: IntervalValidityTable::yahoo(),
                precheck: None,
                answer,
                with_asset: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn refusing(mut self, reason: FallbackReason) -> Self {
            self.precheck = Some(reason);
            self
        }

        fn with_asset(mut self) -> Self {
            self.with_asset = true;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DataSource for StubSource {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new(true, self.with_asset)
        }

        fn validity_table(&self) -> &IntervalValidityTable {
            &self.table
        }

        fn check_request(&self, _request: &BarsRequest) -> Option<FallbackReason> {
            self.precheck
        }

        fn fetch_ohlcv<'a>(
            &'a self,
            _request: &'a BarsRequest,
            _interval: Interval,
        ) -> SourceFuture<'a, RawOhlcv> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answer = (self.answer)();
            Box::pin(async move { answer })
        }

        fn asset<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Asset> {
            let asset = Asset::new(symbol.clone());
            Box::pin(async move { Ok(asset) })
        }
    }

    fn bars() -> Result<RawOhlcv, SourceError> {
        Ok(RawOhlcv {
            timestamps: vec![1_710_000_000, 1_710_086_400],
            open: vec![Some(10.0), Some(11.0)],
            high: vec![Some(12.0), Some(13.0)],
            low: vec![Some(9.0), Some(10.0)],
            close: vec![Some(11.0), Some(12.0)],
            volume: vec![Some(100.0), Some(200.0)],
        })
    }

    fn empty() -> Result<RawOhlcv, SourceError> {
        Err(SourceError::empty_bars("nothing"))
    }

    fn rate_limited() -> Result<RawOhlcv, SourceError> {
        Err(SourceError::rate_limited("slow down"))
    }

    fn daily_request() -> BarsRequest {
        BarsRequest::builder(symbol("AAPL"))
            .period(SymbolicPeriod::OneMonth)
            .interval(Interval::OneDay)
            .build_at(at("2024-03-15T12:00:00Z"))
            .expect("valid request")
    }

    #[tokio::test]
    async fn primary_success_is_returned_without_fallback() {
        let primary = Arc::new(StubSource::new(ProviderId::Alpaca, bars));
        let secondary = Arc::new(StubSource::new(ProviderId::Yahoo, bars));
        let router = BarsRouter::new(primary.clone()).with_secondary(secondary.clone());

        let routed = router.get_bars(&daily_request()).await.expect("bars");

        assert_eq!(routed.selected_source, ProviderId::Alpaca);
        assert_eq!(routed.source_chain, vec![ProviderId::Alpaca]);
        assert_eq!(routed.fallback, None);
        assert!(routed.warnings.is_empty());
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn precheck_skips_primary_without_calling_it() {
        let primary = Arc::new(
            StubSource::new(ProviderId::Alpaca, bars).refusing(FallbackReason::HistoricalDelay),
        );
        let secondary = Arc::new(StubSource::new(ProviderId::Yahoo, bars));
        let router = BarsRouter::new(primary.clone()).with_secondary(secondary.clone());

        let routed = router.get_bars(&daily_request()).await.expect("bars");

        assert_eq!(primary.calls(), 0);
        assert_eq!(routed.selected_source, ProviderId::Yahoo);
        assert_eq!(routed.source_chain, vec![ProviderId::Alpaca, ProviderId::Yahoo]);
        assert_eq!(routed.fallback, Some(FallbackReason::HistoricalDelay));
        assert_eq!(routed.warnings.len(), 1);
        assert!(routed.warnings[0].contains("historical_delay"));
    }

    #[tokio::test]
    async fn empty_primary_falls_back_once() {
        let primary = Arc::new(StubSource::new(ProviderId::Alpaca, empty));
        let secondary = Arc::new(StubSource::new(ProviderId::Yahoo, bars));
        let router = BarsRouter::new(primary.clone()).with_secondary(secondary.clone());

        let routed = router.get_bars(&daily_request()).await.expect("bars");

        assert_eq!(routed.fallback, Some(FallbackReason::Empty));
        assert_eq!(routed.data.len(), 2);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn other_primary_errors_propagate() {
        let primary = Arc::new(StubSource::new(ProviderId::Alpaca, rate_limited));
        let secondary = Arc::new(StubSource::new(ProviderId::Yahoo, bars));
        let router = BarsRouter::new(primary).with_secondary(secondary.clone());

        let error = router.get_bars(&daily_request()).await.expect_err("rate limited");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn secondary_failure_propagates() {
        let primary = Arc::new(StubSource::new(ProviderId::Alpaca, empty));
        let secondary = Arc::new(StubSource::new(ProviderId::Yahoo, rate_limited));
        let router = BarsRouter::new(primary).with_secondary(secondary);

        let error = router.get_bars(&daily_request()).await.expect_err("secondary failed");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn without_secondary_the_primary_is_final() {
        let primary = Arc::new(
            StubSource::new(ProviderId::Yahoo, empty).refusing(FallbackReason::UnsupportedInterval),
        );
        let router = BarsRouter::new(primary.clone());

        let error = router.get_bars(&daily_request()).await.expect_err("empty");

        // 1d, 5d, 1mo and 3mo were all tried on the primary.
        assert_eq!(primary.calls(), 4);
        assert!(error.is_empty_result());
    }

    #[tokio::test]
    async fn many_symbols_route_independently() {
        let router = BarsRouter::new(Arc::new(StubSource::new(ProviderId::Yahoo, bars)));
        let symbols = vec![symbol("MSFT"), symbol("AAPL")];

        let routed = router
            .get_bars_many(&symbols, &daily_request())
            .await
            .expect("bars");

        assert_eq!(routed.len(), 2);
        assert_eq!(routed[&symbol("MSFT")].data.symbol().as_str(), "MSFT");
    }

    #[tokio::test]
    async fn asset_uses_the_first_capable_source() {
        let primary = Arc::new(StubSource::new(ProviderId::Alpaca, bars));
        let secondary = Arc::new(StubSource::new(ProviderId::Yahoo, bars).with_asset());
        let router = BarsRouter::new(primary).with_secondary(secondary);

        let routed = router.get_asset(&symbol("AAPL")).await.expect("asset");
        assert_eq!(routed.selected_source, ProviderId::Yahoo);

        let bars_only = BarsRouter::new(Arc::new(StubSource::new(ProviderId::Alpaca, bars)));
        let error = bars_only.get_asset(&symbol("AAPL")).await.expect_err("unsupported");
        assert_eq!(error.kind(), SourceErrorKind::UnsupportedEndpoint);
    }

    #[tokio::test]
    async fn latest_bar_is_the_last_bar() {
        let router = BarsRouter::new(Arc::new(StubSource::new(ProviderId::Yahoo, bars)));

        let routed = router
            .get_latest_bar(symbol("AAPL"), Interval::OneDay)
            .await
            .expect("latest");

        assert_eq!(routed.data.close, 12.0);
    }

    #[tokio::test]
    async fn price_at_timestamp_uses_the_first_bar() {
        let router = BarsRouter::new(Arc::new(StubSource::new(ProviderId::Yahoo, bars)));

        let routed = router
            .get_price_at_timestamp(symbol("AAPL"), at("2024-03-09T16:00:00Z"), Interval::OneDay)
            .await
            .expect("price");

        assert_eq!(routed.data, 10.0);
    }

    #[test]
    fn price_picks_the_nearer_edge_with_ties_to_open() {
        let bar = Bar::new(
            at("2024-03-15T14:00:00Z"),
            100.0,
            105.0,
            99.0,
            104.0,
            1_000.0,
            Interval::OneHour,
        );

        assert_eq!(price_at_timestamp(&bar, at("2024-03-15T14:10:00Z")), 100.0);
        assert_eq!(price_at_timestamp(&bar, at("2024-03-15T14:30:00Z")), 100.0);
        assert_eq!(price_at_timestamp(&bar, at("2024-03-15T14:31:00Z")), 104.0);
    }

    #[test]
    fn route_success_map_keeps_routing_metadata() {
        let routed = RouteSuccess {
            data: 2,
            selected_source: ProviderId::Yahoo,
            source_chain: vec![ProviderId::Alpaca, ProviderId::Yahoo],
            fallback: Some(FallbackReason::Empty),
            warnings: vec!["w".to_owned()],
            latency_ms: 5,
        };

        let mapped = routed.map(|value| value * 10);

        assert_eq!(mapped.data, 20);
        assert_eq!(mapped.fallback, Some(FallbackReason::Empty));
        assert_eq!(mapped.source_chain.len(), 2);
    }
}

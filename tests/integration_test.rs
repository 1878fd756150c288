//! Integration Tests - Fan-out, Fallback and Dispatch
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::mock;

use daily_market_report::config::credentials::PushCredentials;
use daily_market_report::config::PipelineTimeouts;
use daily_market_report::domain::{
    EntryOrigin, IndexQuote, MetricKind, MetricSpec, Report, ReportField, ValueRange,
    WeatherSnapshot, CALCULATION_FAILED, FETCH_FAILED,
};
use daily_market_report::error::ReportError;
use daily_market_report::ports::{
    AccessToken, MetricSource, PushGateway, SendReceipt, TemplateMessage,
};
use daily_market_report::usecases::collector::{
    FallbackReason, Pipeline, PipelineSet, ReportCollector,
};
use daily_market_report::usecases::dispatcher::NotificationDispatcher;
use daily_market_report::usecases::fallback::FallbackResolver;

// ---- Mock Definitions ----

mock! {
    pub PriceSource {}

    #[async_trait::async_trait]
    impl MetricSource<f64> for PriceSource {
        fn name(&self) -> &str;
        async fn fetch(&self) -> Result<f64, ReportError>;
    }
}

mock! {
    pub QuoteSource {}

    #[async_trait::async_trait]
    impl MetricSource<IndexQuote> for QuoteSource {
        fn name(&self) -> &str;
        async fn fetch(&self) -> Result<IndexQuote, ReportError>;
    }
}

mock! {
    pub WeatherSource {}

    #[async_trait::async_trait]
    impl MetricSource<WeatherSnapshot> for WeatherSource {
        fn name(&self) -> &str;
        async fn fetch(&self) -> Result<WeatherSnapshot, ReportError>;
    }
}

mock! {
    pub Gateway {}

    #[async_trait::async_trait]
    impl PushGateway for Gateway {
        async fn access_token(&self, app_id: &str, app_secret: &str)
            -> Result<AccessToken, ReportError>;
        async fn send_template(&self, token: &AccessToken, message: &TemplateMessage)
            -> Result<SendReceipt, ReportError>;
    }
}

/// Source that never answers within any reasonable bound.
struct HangingSource;

#[async_trait]
impl MetricSource<IndexQuote> for HangingSource {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn fetch(&self) -> Result<IndexQuote, ReportError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(IndexQuote::new(1.0, None))
    }
}

// ---- Helpers ----

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn price_ok(name: &'static str, value: f64) -> Arc<MockPriceSource> {
    let mut m = MockPriceSource::new();
    m.expect_name().return_const(name.to_string());
    m.expect_fetch().times(1).returning(move || Ok(value));
    Arc::new(m)
}

fn price_down(name: &'static str) -> Arc<MockPriceSource> {
    let mut m = MockPriceSource::new();
    m.expect_name().return_const(name.to_string());
    m.expect_fetch()
        .returning(move || Err(ReportError::unavailable(name, "connection refused")));
    Arc::new(m)
}

fn price_unused(name: &'static str) -> Arc<MockPriceSource> {
    let mut m = MockPriceSource::new();
    m.expect_name().return_const(name.to_string());
    m.expect_fetch().times(0);
    Arc::new(m)
}

fn quote_down(name: &'static str) -> Arc<MockQuoteSource> {
    let mut m = MockQuoteSource::new();
    m.expect_name().return_const(name.to_string());
    m.expect_fetch()
        .returning(move || Err(ReportError::parse(name, "empty payload")));
    Arc::new(m)
}

fn quote_ok(name: &'static str, close: f64, prev: f64) -> Arc<MockQuoteSource> {
    let mut m = MockQuoteSource::new();
    m.expect_name().return_const(name.to_string());
    m.expect_fetch()
        .returning(move || Ok(IndexQuote::new(close, Some(prev))));
    Arc::new(m)
}

fn weather_down() -> Arc<MockWeatherSource> {
    let mut m = MockWeatherSource::new();
    m.expect_name().return_const("qweather".to_string());
    m.expect_fetch()
        .returning(|| Err(ReportError::ConfigMissing("HEFENG_KEY".into())));
    Arc::new(m)
}

fn spec(kind: MetricKind, min: f64, max: f64, default: Option<f64>) -> MetricSpec {
    let s = MetricSpec::new(kind, ValueRange::new(min, max));
    match default {
        Some(d) => s.with_default(d),
        None => s,
    }
}

fn price_chain(
    kind: MetricKind,
    range: (f64, f64),
    default: Option<f64>,
    sources: Vec<Arc<MockPriceSource>>,
) -> FallbackResolver<f64> {
    let mut r = FallbackResolver::new(spec(kind, range.0, range.1, default), REQUEST_TIMEOUT);
    for (rank, s) in sources.into_iter().enumerate() {
        r.push_ranked(rank, s);
    }
    r
}

fn quote_chain(source: Arc<dyn MetricSource<IndexQuote>>) -> FallbackResolver<IndexQuote> {
    FallbackResolver::new(spec(MetricKind::IndexLevel, 1.0, 1e6, None), REQUEST_TIMEOUT)
        .with_source(source)
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

/// Every pipeline fails except FX.
fn mostly_failing_set() -> PipelineSet {
    PipelineSet {
        weather: FallbackResolver::new(
            spec(MetricKind::Weather, -60.0, 60.0, None),
            REQUEST_TIMEOUT,
        )
        .with_source(weather_down()),
        sh_index: quote_chain(quote_down("sina")),
        hs300: quote_chain(quote_down("sina")),
        pe_ratio: price_chain(
            MetricKind::PeRatio,
            (5.0, 30.0),
            Some(13.5),
            vec![price_down("tushare"), price_down("csindex"), price_down("xueqiu")],
        ),
        bond_yield: price_chain(
            MetricKind::BondYield,
            (0.5, 10.0),
            None,
            vec![price_down("eastmoney")],
        ),
        dji: quote_chain(quote_down("yahoo")),
        nasdaq: quote_chain(quote_down("yahoo")),
        sp500: quote_chain(quote_down("yahoo")),
        usd_cny: price_chain(
            MetricKind::FxRate,
            (5.0, 10.0),
            Some(7.25),
            vec![price_ok("yahoo", 7.1842)],
        ),
        bitcoin: price_chain(
            MetricKind::CryptoPrice,
            (1.0, 1e7),
            None,
            vec![price_down("yahoo_realtime")],
        ),
        ethereum: price_chain(
            MetricKind::CryptoPrice,
            (1.0, 1e7),
            None,
            vec![price_down("yahoo_realtime")],
        ),
    }
}

fn credentials() -> PushCredentials {
    PushCredentials {
        app_id: "wx_app".into(),
        app_secret: "secret".into(),
        open_id: "o_user".into(),
        template_id: "tmpl_1".into(),
    }
}

fn sample_report() -> Report {
    Report::builder().build()
}

// ---- Fallback Resolver ----

#[tokio::test]
async fn test_resolver_stops_after_first_success() {
    let resolver = price_chain(
        MetricKind::PeRatio,
        (5.0, 30.0),
        Some(13.5),
        vec![price_down("tushare"), price_ok("csindex", 12.3), price_unused("xueqiu")],
    );

    let res = resolver.resolve().await;

    assert_eq!(res.ok().copied(), Some(12.3));
    assert_eq!(res.origin, EntryOrigin::Source("csindex".into()));
    assert_eq!(res.attempts.len(), 2);
}

#[tokio::test]
async fn test_resolver_rejects_out_of_range_then_defaults() {
    let resolver = price_chain(
        MetricKind::PeRatio,
        (5.0, 30.0),
        Some(13.5),
        vec![price_ok("tushare", 0.0), price_ok("xueqiu", 45.0)],
    );

    let res = resolver.resolve().await;

    assert_eq!(res.ok().copied(), Some(13.5));
    assert_eq!(res.origin, EntryOrigin::Default);
    assert!(res.attempts.iter().all(|a| a.outcome() == "invalid"));
}

// ---- Fan-out Coordinator ----

#[tokio::test]
async fn test_fan_out_isolates_failures() {
    let collector = ReportCollector::new(mostly_failing_set(), PipelineTimeouts::default(), 6)
        .with_date(date());

    let collection = collector.collect().await;
    let report = &collection.report;

    assert_eq!(report.entries().count(), ReportField::ALL.len());
    assert_eq!(report.value(ReportField::Date), "2025年01月06日");
    assert_eq!(report.value(ReportField::UsdCny), "7.1842");
    for field in [
        ReportField::Weather,
        ReportField::ShIndex,
        ReportField::Hs300,
        ReportField::Bond10y,
        ReportField::Dji,
        ReportField::Nasdaq,
        ReportField::Sp500,
        ReportField::Bitcoin,
        ReportField::Ethereum,
    ] {
        assert_eq!(report.value(field), FETCH_FAILED, "{field}");
    }
    // PE defaulted but bond has no value: premium cannot be computed.
    assert_eq!(report.value(ReportField::RiskPremium), CALCULATION_FAILED);
    assert!(collection.fallbacks.is_empty());
}

#[tokio::test]
async fn test_fan_out_risk_premium_uses_defaults() {
    let mut set = mostly_failing_set();
    set.bond_yield = price_chain(
        MetricKind::BondYield,
        (0.5, 10.0),
        Some(2.65),
        vec![price_down("eastmoney"), price_down("tushare")],
    );
    set.sh_index = quote_chain(quote_ok("sina", 3204.36, 3190.0));

    let collection = ReportCollector::new(set, PipelineTimeouts::default(), 6)
        .with_date(date())
        .collect()
        .await;
    let report = &collection.report;

    assert_eq!(report.value(ReportField::Bond10y), "2.650%");
    assert_eq!(report.entry(ReportField::Bond10y).unwrap().origin, EntryOrigin::Default);
    assert_eq!(report.value(ReportField::RiskPremium), "4.757%");
    assert_eq!(report.value(ReportField::ShIndex), "3204.36 (+0.45%)");
    assert_eq!(
        collection
            .attempts
            .iter()
            .filter(|(m, _)| *m == MetricKind::PeRatio)
            .count(),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_bound_substitutes_outputs() {
    let mut set = mostly_failing_set();
    set.dji = quote_chain(Arc::new(HangingSource));
    set.nasdaq = quote_chain(quote_ok("yahoo", 19_621.7, 19_500.0));
    set.sh_index = quote_chain(Arc::new(HangingSource));
    set.pe_ratio = price_chain(
        MetricKind::PeRatio,
        (5.0, 30.0),
        Some(13.5),
        vec![price_ok("csindex", 12.3)],
    );
    set.bond_yield = price_chain(
        MetricKind::BondYield,
        (0.5, 10.0),
        None,
        vec![price_ok("eastmoney", 2.0)],
    );

    let timeouts = PipelineTimeouts {
        us_equity_secs: 2,
        china_equity_secs: 3,
        ..PipelineTimeouts::default()
    };
    let collection = ReportCollector::new(set, timeouts, 6)
        .with_date(date())
        .collect()
        .await;

    assert_eq!(
        collection.fallbacks,
        vec![
            (Pipeline::ChinaEquity, FallbackReason::Timeout),
            (Pipeline::UsEquity, FallbackReason::Timeout),
        ]
    );
    // Only the slow chain in each pipeline loses its value.
    assert_eq!(collection.report.value(ReportField::Dji), FETCH_FAILED);
    assert_eq!(collection.report.value(ReportField::Nasdaq), "19621.70 (+0.62%)");
    assert_eq!(collection.report.value(ReportField::ShIndex), FETCH_FAILED);
    // Premium uses the resolved PE 12.3, not the 13.5 default.
    assert_eq!(collection.report.value(ReportField::RiskPremium), "6.130%");
    // Attempts made before the bound are kept.
    let outcome = |kind: MetricKind, source: &str| {
        collection
            .attempts
            .iter()
            .find(|(k, a)| *k == kind && a.source == source)
            .map(|(_, a)| a.outcome())
    };
    assert_eq!(outcome(MetricKind::IndexLevel, "hanging"), Some("unavailable"));
    assert_eq!(outcome(MetricKind::PeRatio, "csindex"), Some("ok"));
    // Other pipelines are unaffected.
    assert_eq!(collection.report.value(ReportField::UsdCny), "7.1842");
}

// ---- Notification Dispatcher ----

#[tokio::test]
async fn test_dispatch_success() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_access_token()
        .withf(|app_id, secret| app_id == "wx_app" && secret == "secret")
        .times(1)
        .returning(|_, _| {
            Ok(AccessToken {
                token: "ACCESS_TOKEN_VALUE".into(),
                expires_in: 7200,
            })
        });
    gateway
        .expect_send_template()
        .withf(|token, message| {
            token.token == "ACCESS_TOKEN_VALUE"
                && message.touser == "o_user"
                && message.template_id == "tmpl_1"
                && message.url == "https://weixin.qq.com"
                && message.data.len() == 12
                && message.data["bitcoin"].value == FETCH_FAILED
        })
        .times(1)
        .returning(|_, _| {
            Ok(SendReceipt {
                errcode: 0,
                errmsg: "ok".into(),
                msgid: Some(42),
            })
        });

    let dispatcher = NotificationDispatcher::new(gateway, "https://weixin.qq.com");
    let delivery = dispatcher.dispatch(&sample_report(), &credentials()).await.unwrap();

    assert_eq!(delivery.msgid, Some(42));
}

#[tokio::test]
async fn test_dispatch_invalid_template_carries_hint() {
    let mut gateway = MockGateway::new();
    gateway.expect_access_token().returning(|_, _| {
        Ok(AccessToken {
            token: "t".into(),
            expires_in: 7200,
        })
    });
    gateway.expect_send_template().times(1).returning(|_, _| {
        Ok(SendReceipt {
            errcode: 40037,
            errmsg: "invalid template_id".into(),
            msgid: None,
        })
    });

    let dispatcher = NotificationDispatcher::new(gateway, "https://weixin.qq.com");
    let err = dispatcher.dispatch(&sample_report(), &credentials()).await.unwrap_err();

    match err {
        ReportError::DispatchFailure { code, hint, .. } => {
            assert_eq!(code, 40037);
            assert!(hint.unwrap().contains("TEMPLATE_ID"));
        }
        other => panic!("expected DispatchFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dispatch_stops_when_token_exchange_fails() {
    let mut gateway = MockGateway::new();
    gateway.expect_access_token().returning(|_, _| {
        Err(ReportError::DispatchFailure {
            code: 40013,
            message: "invalid appid".into(),
            hint: None,
        })
    });
    gateway.expect_send_template().times(0);

    let dispatcher = NotificationDispatcher::new(gateway, "https://weixin.qq.com");
    let err = dispatcher.dispatch(&sample_report(), &credentials()).await.unwrap_err();

    assert!(matches!(err, ReportError::DispatchFailure { code: 40013, .. }));
}

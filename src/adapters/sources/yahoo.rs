//! Yahoo Finance Source - Symbol-keyed Chart API
//!
//! One endpoint (`v8/finance/chart/{symbol}`) serves index history,
//! FX rates and crypto prices. A five-day daily window guarantees at
//! least two trading sessions for the change computation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::domain::IndexQuote;
use crate::error::ReportError;
use crate::ports::MetricSource;

/// Chart API envelope.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parsed chart: the real-time price plus the daily close series.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart5d {
    /// `meta.regularMarketPrice`.
    pub market_price: Option<f64>,
    /// Daily closes, oldest first, gaps removed.
    pub closes: Vec<f64>,
}

/// Parse a chart response body.
///
/// # Errors
/// `SourceUnavailable` when the provider reports an error,
/// `ParseFailure` when the result block is missing.
pub fn parse_chart(source: &str, body: &str) -> Result<Chart5d, ReportError> {
    let response: ChartResponse = crate::adapters::http::decode(source, body)?;
    if let Some(err) = response.chart.error {
        return Err(ReportError::unavailable(
            source,
            format!("{}: {}", err.code, err.description),
        ));
    }
    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ReportError::parse(source, "empty chart result"))?;

    let closes = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .map(|q| q.close.into_iter().flatten().collect())
        .unwrap_or_default();

    Ok(Chart5d {
        market_price: result.meta.regular_market_price,
        closes,
    })
}

/// Shared chart fetch for one symbol.
struct ChartClient {
    http: Arc<HttpFetcher>,
    base_url: String,
    symbol: String,
}

impl ChartClient {
    fn new(http: Arc<HttpFetcher>, base_url: &str, symbol: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol,
        }
    }

    async fn fetch(&self, source: &str) -> Result<Chart5d, ReportError> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=5d&interval=1d",
            self.base_url, self.symbol
        );
        let body = self.http.get_text(source, &url, &[]).await?;
        parse_chart(source, &body)
    }
}

/// Index close + change from the daily close series.
pub struct YahooQuoteSource {
    client: ChartClient,
}

impl YahooQuoteSource {
    /// Create the adapter for one symbol (e.g. "^DJI", "000300.SS").
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, symbol: impl Into<String>) -> Self {
        Self {
            client: ChartClient::new(http, base_url, symbol.into()),
        }
    }
}

#[async_trait]
impl MetricSource<IndexQuote> for YahooQuoteSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self), fields(symbol = %self.client.symbol))]
    async fn fetch(&self) -> Result<IndexQuote, ReportError> {
        let chart = self.client.fetch("yahoo").await?;
        IndexQuote::from_closes(&chart.closes)
            .ok_or_else(|| ReportError::parse("yahoo", "no closes in window"))
    }
}

/// Which number a `YahooPriceSource` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    /// `regularMarketPrice` (real-time).
    Realtime,
    /// Last daily close.
    LastClose,
}

/// Single price from the chart endpoint.
pub struct YahooPriceSource {
    client: ChartClient,
    field: PriceField,
    name: &'static str,
}

impl YahooPriceSource {
    /// Create the adapter. `name` distinguishes chain entries that
    /// share the endpoint (e.g. "yahoo_realtime", "yahoo_history").
    pub fn new(
        http: Arc<HttpFetcher>,
        base_url: &str,
        symbol: impl Into<String>,
        field: PriceField,
        name: &'static str,
    ) -> Self {
        Self {
            client: ChartClient::new(http, base_url, symbol.into()),
            field,
            name,
        }
    }
}

#[async_trait]
impl MetricSource<f64> for YahooPriceSource {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(skip(self), fields(symbol = %self.client.symbol, field = ?self.field))]
    async fn fetch(&self) -> Result<f64, ReportError> {
        let chart = self.client.fetch(self.name).await?;
        let price = match self.field {
            PriceField::Realtime => chart.market_price,
            PriceField::LastClose => chart.closes.last().copied(),
        };
        price.ok_or_else(|| ReportError::parse(self.name, format!("no {:?} price", self.field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":39123.5},
        "indicators":{"quote":[{"close":[38900.0,null,39010.25,39123.5]}]}}],"error":null}}"#;

    #[test]
    fn test_parse_chart_skips_nulls() {
        let chart = parse_chart("yahoo", BODY).unwrap();
        assert_eq!(chart.market_price, Some(39123.5));
        assert_eq!(chart.closes, vec![38900.0, 39010.25, 39123.5]);
    }

    #[test]
    fn test_parse_chart_error_block() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let err = parse_chart("yahoo", body).unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_quote_from_chart() {
        let chart = parse_chart("yahoo", BODY).unwrap();
        let quote = IndexQuote::from_closes(&chart.closes).unwrap();
        assert_eq!(quote.prev_close, Some(39010.25));
    }
}

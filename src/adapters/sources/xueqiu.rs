//! Xueqiu Source - CSI 300 Trailing PE from the Quote API

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "xueqiu";
const REFERER: &str = "https://xueqiu.com/";

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    data: Option<QuoteData>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_description: String,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    quote: Option<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    pe_ttm: Option<f64>,
}

/// Xueqiu quote adapter.
pub struct XueqiuPeSource {
    http: Arc<HttpFetcher>,
    base_url: String,
    symbol: String,
}

impl XueqiuPeSource {
    /// Create the adapter ("SH000300" for CSI 300).
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, symbol: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.into(),
        }
    }
}

#[async_trait]
impl MetricSource<f64> for XueqiuPeSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(symbol = %self.symbol))]
    async fn fetch(&self) -> Result<f64, ReportError> {
        let url = format!(
            "{}/v5/stock/quote.json?symbol={}&extend=detail",
            self.base_url, self.symbol
        );
        let body = self
            .http
            .get_text(NAME, &url, &[("Referer", REFERER)])
            .await?;
        parse_quote(&body)
    }
}

/// Extract `data.quote.pe_ttm`.
///
/// # Errors
/// `SourceUnavailable` on an API error code, `ParseFailure` when the
/// value is absent.
pub fn parse_quote(body: &str) -> Result<f64, ReportError> {
    let response: QuoteResponse = crate::adapters::http::decode(NAME, body)?;
    if response.error_code != 0 {
        return Err(ReportError::unavailable(
            NAME,
            format!("error {}: {}", response.error_code, response.error_description),
        ));
    }
    response
        .data
        .and_then(|d| d.quote)
        .and_then(|q| q.pe_ttm)
        .ok_or_else(|| ReportError::parse(NAME, "no pe_ttm in quote"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pe_extracted() {
        let body = r#"{"data":{"quote":{"symbol":"SH000300","pe_ttm":12.77}},"error_code":0,"error_description":""}"#;
        assert_eq!(parse_quote(body).unwrap(), 12.77);
    }

    #[test]
    fn test_cookie_wall() {
        let body = r#"{"error_description":"遇到错误，请刷新页面或者重新登录帐号后再试","error_code":400016}"#;
        assert_eq!(parse_quote(body).unwrap_err().kind(), "unavailable");
    }

    #[test]
    fn test_null_pe() {
        let body = r#"{"data":{"quote":{"pe_ttm":null}},"error_code":0}"#;
        assert_eq!(parse_quote(body).unwrap_err().kind(), "parse");
    }
}

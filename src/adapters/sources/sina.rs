//! Sina Quote Source - Chinese Index Levels
//!
//! Parses the provider's JavaScript-assignment text format:
//! `var hq_str_sh000001="name,open,prev_close,current,high,low,...";`
//! The service rejects requests without a Sina referer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::domain::IndexQuote;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "sina";
const REFERER: &str = "https://finance.sina.com.cn";

/// Field positions in the comma-delimited payload.
const PREV_CLOSE: usize = 2;
const CURRENT: usize = 3;

/// Sina real-time index quote adapter.
pub struct SinaIndexSource {
    /// Shared HTTP client.
    http: Arc<HttpFetcher>,
    /// Service base URL.
    base_url: String,
    /// Provider symbol (e.g. "sh000001").
    symbol: String,
}

impl SinaIndexSource {
    /// Create the adapter for one symbol.
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, symbol: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.into(),
        }
    }
}

#[async_trait]
impl MetricSource<IndexQuote> for SinaIndexSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(symbol = %self.symbol))]
    async fn fetch(&self) -> Result<IndexQuote, ReportError> {
        let url = format!("{}/list={}", self.base_url, self.symbol);
        let body = self
            .http
            .get_text(NAME, &url, &[("Referer", REFERER)])
            .await?;
        parse_quote(&body)
    }
}

/// Parse one `hq_str_` assignment.
///
/// # Errors
/// `ParseFailure` when the quoted payload is missing, empty or short.
pub fn parse_quote(body: &str) -> Result<IndexQuote, ReportError> {
    let start = body
        .find('"')
        .ok_or_else(|| ReportError::parse(NAME, "no quoted payload"))?;
    let rest = &body[start + 1..];
    let end = rest
        .find('"')
        .ok_or_else(|| ReportError::parse(NAME, "unterminated payload"))?;
    let payload = &rest[..end];

    if payload.is_empty() {
        return Err(ReportError::parse(NAME, "empty payload (unknown symbol?)"));
    }

    let fields: Vec<&str> = payload.split(',').collect();
    let number = |i: usize| -> Result<f64, ReportError> {
        let raw = fields
            .get(i)
            .ok_or_else(|| ReportError::parse(NAME, format!("only {} fields", fields.len())))?;
        raw.trim()
            .parse()
            .map_err(|_| ReportError::parse(NAME, format!("field {i} not numeric: {raw:?}")))
    };

    let current = number(CURRENT)?;
    let prev_close = number(PREV_CLOSE)?;
    let prev = (prev_close > 0.0).then_some(prev_close);
    Ok(IndexQuote::new(current, prev))
}

//! China Securities Index Source - Official CSI 300 Valuation
//!
//! Queries the index performance endpoint over a short trailing date
//! window and takes the rolling PE (`peg`) of the most recent session.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use serde::Deserialize;
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "csindex";

/// Calendar days looked back; covers long holiday closures.
const WINDOW_DAYS: i64 = 14;

#[derive(Debug, Deserialize)]
struct PerfResponse {
    #[serde(default)]
    data: Vec<PerfRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerfRow {
    trade_date: String,
    peg: Option<f64>,
}

/// CSI official index valuation adapter.
pub struct CsIndexPeSource {
    http: Arc<HttpFetcher>,
    base_url: String,
    index_code: String,
}

impl CsIndexPeSource {
    /// Create the adapter (index code "000300" for CSI 300).
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, index_code: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_code: index_code.into(),
        }
    }

    fn url(&self, today: NaiveDate) -> String {
        let start = today - ChronoDuration::days(WINDOW_DAYS);
        format!(
            "{}/csindex-home/perf/index-perf?indexCode={}&startDate={}&endDate={}",
            self.base_url,
            self.index_code,
            start.format("%Y%m%d"),
            today.format("%Y%m%d")
        )
    }
}

#[async_trait]
impl MetricSource<f64> for CsIndexPeSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(index = %self.index_code))]
    async fn fetch(&self) -> Result<f64, ReportError> {
        let url = self.url(Local::now().date_naive());
        let body = self.http.get_text(NAME, &url, &[]).await?;
        parse_perf(&body)
    }
}

/// Rolling PE of the latest session in a performance response.
///
/// # Errors
/// `ParseFailure` when no row carries a PE.
pub fn parse_perf(body: &str) -> Result<f64, ReportError> {
    let response: PerfResponse = crate::adapters::http::decode(NAME, body)?;
    response
        .data
        .iter()
        .filter_map(|row| row.peg.map(|pe| (row.trade_date.as_str(), pe)))
        .max_by(|a, b| a.0.cmp(b.0))
        .map(|(_, pe)| pe)
        .ok_or_else(|| ReportError::parse(NAME, "no PE in window"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_session_pe() {
        let body = r#"{"code":"200","data":[
            {"tradeDate":"20250103","peg":12.05},
            {"tradeDate":"20250106","peg":12.31},
            {"tradeDate":"20250107","peg":null}]}"#;
        assert_eq!(parse_perf(body).unwrap(), 12.31);
    }

    #[test]
    fn test_empty_window() {
        assert!(parse_perf(r#"{"code":"200","data":[]}"#).is_err());
    }

    #[test]
    fn test_url_window() {
        let http = Arc::new(HttpFetcher::new(std::time::Duration::from_secs(1), "t").unwrap());
        let source = CsIndexPeSource::new(http, "https://example.test/", "000300");
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(
            source.url(today),
            "https://example.test/csindex-home/perf/index-perf?indexCode=000300&startDate=20250101&endDate=20250115"
        );
    }
}

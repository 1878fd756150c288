//! Eastmoney Source - China 10-year Treasury Yield
//!
//! Reads the treasury-yield report from the data-center API, newest
//! first, and takes the first row with a 10-year value (column
//! `EMM00166466`, percent).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "eastmoney";
const TEN_YEAR_COLUMN: &str = "EMM00166466";

#[derive(Debug, Deserialize)]
struct DataCenterResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    result: Option<ResultBlock>,
}

#[derive(Debug, Deserialize)]
struct ResultBlock {
    #[serde(default)]
    data: Vec<YieldRow>,
}

#[derive(Debug, Deserialize)]
struct YieldRow {
    #[serde(rename = "EMM00166466")]
    ten_year: Option<f64>,
}

/// Eastmoney data-center treasury yield adapter.
pub struct EastmoneyBondSource {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl EastmoneyBondSource {
    /// Create the adapter.
    pub fn new(http: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MetricSource<f64> for EastmoneyBondSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<f64, ReportError> {
        let url = format!(
            "{}/api/data/v1/get?reportName=RPTA_WEB_TREASURYYIELD&columns=SOLAR_DATE,{TEN_YEAR_COLUMN}\
             &sortColumns=SOLAR_DATE&sortTypes=-1&pageNumber=1&pageSize=5",
            self.base_url
        );
        let body = self.http.get_text(NAME, &url, &[]).await?;
        parse_yield(&body)
    }
}

/// First non-null 10-year yield in a newest-first response.
///
/// # Errors
/// `SourceUnavailable` when the API reports failure, `ParseFailure`
/// when no row carries a value.
pub fn parse_yield(body: &str) -> Result<f64, ReportError> {
    let response: DataCenterResponse = crate::adapters::http::decode(NAME, body)?;
    if !response.success {
        return Err(ReportError::unavailable(NAME, response.message));
    }
    response
        .result
        .into_iter()
        .flat_map(|r| r.data)
        .find_map(|row| row.ten_year)
        .ok_or_else(|| ReportError::parse(NAME, "no 10-year yield rows"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_null_row() {
        let body = r#"{"success":true,"message":"ok","result":{"data":[
            {"SOLAR_DATE":"2025-01-07 00:00:00","EMM00166466":null},
            {"SOLAR_DATE":"2025-01-06 00:00:00","EMM00166466":1.6215},
            {"SOLAR_DATE":"2025-01-03 00:00:00","EMM00166466":1.6}]}}"#;
        assert_eq!(parse_yield(body).unwrap(), 1.6215);
    }

    #[test]
    fn test_failure_flag() {
        let body = r#"{"success":false,"message":"返回数据为空","result":null}"#;
        assert_eq!(parse_yield(body).unwrap_err().kind(), "unavailable");
    }
}

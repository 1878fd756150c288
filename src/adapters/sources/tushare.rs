//! Tushare Pro Source - Token-gated Tabular API
//!
//! Every call is a POST of `{api_name, token, params, fields}`; the
//! answer is a column list plus row arrays. Used for the CSI 300
//! trailing PE (`index_dailybasic`) and the 10-year treasury yield
//! (`yc_cb`). Without a token the adapter fails fast so the chain
//! moves to the next source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "tushare";

#[derive(Debug, Serialize)]
struct Request<'a> {
    api_name: &'a str,
    token: &'a str,
    params: &'a Value,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct Response {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<Table>,
}

/// Column names + rows.
#[derive(Debug, Deserialize)]
pub struct Table {
    /// Column names.
    pub fields: Vec<String>,
    /// Rows, one value per column.
    pub items: Vec<Vec<Value>>,
}

/// One Tushare query yielding one number.
pub struct TushareSource {
    http: Arc<HttpFetcher>,
    url: String,
    token: Option<String>,
    api_name: &'static str,
    params: Value,
    /// Column holding the value.
    column: &'static str,
}

impl TushareSource {
    /// CSI 300 trailing-twelve-month PE.
    pub fn pe_ttm(http: Arc<HttpFetcher>, url: &str, token: Option<String>) -> Self {
        Self {
            http,
            url: url.to_string(),
            token,
            api_name: "index_dailybasic",
            params: json!({ "ts_code": "000300.SH" }),
            column: "pe_ttm",
        }
    }

    /// China government bond 10-year yield (percent).
    pub fn bond_10y(http: Arc<HttpFetcher>, url: &str, token: Option<String>) -> Self {
        Self {
            http,
            url: url.to_string(),
            token,
            api_name: "yc_cb",
            params: json!({ "ts_code": "1001.CB", "curve_type": "0", "curve_term": 10 }),
            column: "yield",
        }
    }
}

#[async_trait]
impl MetricSource<f64> for TushareSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(api = self.api_name))]
    async fn fetch(&self) -> Result<f64, ReportError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ReportError::ConfigMissing("TUSHARE_TOKEN".to_string()))?;
        let fields = format!("trade_date,{}", self.column);
        let request = Request {
            api_name: self.api_name,
            token,
            params: &self.params,
            fields: &fields,
        };
        let response: Response = self.http.post_json(NAME, &self.url, &request).await?;
        if response.code != 0 {
            return Err(ReportError::unavailable(
                NAME,
                format!(
                    "code {}: {}",
                    response.code,
                    response.msg.unwrap_or_default()
                ),
            ));
        }
        let table = response
            .data
            .ok_or_else(|| ReportError::parse(NAME, "missing data table"))?;
        latest_value(&table, self.column)
    }
}

/// Value of `column` in the row with the latest `trade_date`.
///
/// Rows whose value is null or non-numeric are skipped. Without a
/// `trade_date` column the first usable row wins.
///
/// # Errors
/// `ParseFailure` when the column is absent or no row is usable.
pub fn latest_value(table: &Table, column: &str) -> Result<f64, ReportError> {
    let value_idx = table
        .fields
        .iter()
        .position(|f| f == column)
        .ok_or_else(|| ReportError::parse(NAME, format!("no {column} column")))?;
    let date_idx = table.fields.iter().position(|f| f == "trade_date");

    table
        .items
        .iter()
        .filter_map(|row| {
            let value = row.get(value_idx).and_then(Value::as_f64)?;
            let date = date_idx
                .and_then(|i| row.get(i))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some((date, value))
        })
        .reduce(|best, next| if next.0 > best.0 { next } else { best })
        .map(|(_, value)| value)
        .ok_or_else(|| ReportError::parse(NAME, format!("no usable {column} rows")))
}

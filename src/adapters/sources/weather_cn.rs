//! Regional Forecast Page Source - Scraped Weather Fallback
//!
//! Scrapes the regional text forecast page (one table row per city).
//! Only the first `conMidtab` block (today) is read. Cells are
//! addressed from the end of the row because the first row of each
//! province carries an extra leading cell.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::adapters::http::HttpFetcher;
use crate::domain::WeatherSnapshot;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "weather_cn";

/// Header rows at the top of each city table.
const HEADER_ROWS: usize = 2;

/// Minimum cells in a city row.
const MIN_CELLS: usize = 8;

/// Regional forecast page adapter.
pub struct WeatherCnSource {
    /// Shared HTTP client.
    http: Arc<HttpFetcher>,
    /// Page URL.
    url: String,
    /// City to look up (exact match on the city cell).
    city: String,
}

impl WeatherCnSource {
    /// Create the adapter.
    pub fn new(http: Arc<HttpFetcher>, url: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            city: city.into(),
        }
    }
}

#[async_trait]
impl MetricSource<WeatherSnapshot> for WeatherCnSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(city = %self.city))]
    async fn fetch(&self) -> Result<WeatherSnapshot, ReportError> {
        let page = self.http.get_text(NAME, &self.url, &[]).await?;
        parse_page(&page, &self.city)
    }
}

fn selector(css: &str) -> Result<Selector, ReportError> {
    Selector::parse(css).map_err(|e| ReportError::parse(NAME, format!("selector {css}: {e}")))
}

/// Non-blank text fragments of a cell, trimmed.
fn strings(cell: ElementRef<'_>) -> Vec<&str> {
    cell.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn first(cell: ElementRef<'_>) -> Option<&str> {
    strings(cell).into_iter().next()
}

/// Find `city` in the page and build its snapshot.
///
/// # Errors
/// `ParseFailure` when the layout is unexpected or the city is absent.
pub fn parse_page(page: &str, city: &str) -> Result<WeatherSnapshot, ReportError> {
    let document = Html::parse_document(page);
    let block_sel = selector("div.conMidtab")?;
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let block = document
        .select(&block_sel)
        .next()
        .ok_or_else(|| ReportError::parse(NAME, "no conMidtab block"))?;

    for table in block.select(&table_sel) {
        for row in table.select(&row_sel).skip(HEADER_ROWS) {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            if cells.len() < MIN_CELLS {
                continue;
            }
            let at = |back: usize| cells[cells.len() - back];

            if first(at(8)) != Some(city) {
                continue;
            }

            let condition = first(at(7)).unwrap_or_default().to_string();
            let wind: String = strings(at(6)).into_iter().take(2).collect();
            let high = first(at(5)).unwrap_or("-");
            let low = first(at(2))
                .ok_or_else(|| ReportError::parse(NAME, "empty low temperature cell"))?;

            let temp_low: f64 = low
                .parse()
                .map_err(|_| ReportError::parse(NAME, format!("bad low temperature {low:?}")))?;
            let temp_high = if high == "-" {
                None
            } else {
                Some(high.parse::<f64>().map_err(|_| {
                    ReportError::parse(NAME, format!("bad high temperature {high:?}"))
                })?)
            };

            debug!(city, condition = %condition, "City row found");
            return Ok(WeatherSnapshot {
                city: city.to_string(),
                temp_low,
                temp_high,
                condition,
                wind,
            });
        }
    }

    Err(ReportError::parse(NAME, format!("city {city} not found")))
}

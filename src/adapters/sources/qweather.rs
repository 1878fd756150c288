//! QWeather Source - Primary Real-time Weather Provider
//!
//! Calls the `v7/weather/now` endpoint for a location id. The provider
//! signals errors in-band: HTTP 200 with a `code` field other than
//! `"200"`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::adapters::http::HttpFetcher;
use crate::domain::WeatherSnapshot;
use crate::error::ReportError;
use crate::ports::MetricSource;

const NAME: &str = "qweather";

/// `v7/weather/now` response.
#[derive(Debug, Deserialize)]
struct NowResponse {
    code: String,
    now: Option<NowBlock>,
}

/// Nested `now` object. All values arrive as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NowBlock {
    temp: String,
    text: String,
    #[serde(default)]
    wind_dir: String,
    #[serde(default)]
    wind_scale: String,
}

/// QWeather real-time weather adapter.
pub struct QWeatherSource {
    /// Shared HTTP client.
    http: Arc<HttpFetcher>,
    /// API base, `https://<host>` unless the host already has a scheme.
    base_url: String,
    /// Location id (e.g. "101280301").
    location: String,
    /// API key; absent means the adapter always fails fast.
    key: Option<String>,
    /// City label carried into the snapshot.
    city: String,
}

impl QWeatherSource {
    /// Create the adapter.
    pub fn new(
        http: Arc<HttpFetcher>,
        host: &str,
        location: impl Into<String>,
        key: Option<String>,
        city: impl Into<String>,
    ) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        Self {
            http,
            base_url,
            location: location.into(),
            key,
            city: city.into(),
        }
    }

    fn parse(&self, response: NowResponse) -> Result<WeatherSnapshot, ReportError> {
        if response.code != "200" {
            return Err(ReportError::unavailable(
                NAME,
                format!("provider code {}", response.code),
            ));
        }
        let now = response
            .now
            .ok_or_else(|| ReportError::parse(NAME, "missing `now` block"))?;
        let temp: f64 = now
            .temp
            .trim()
            .parse()
            .map_err(|_| ReportError::parse(NAME, format!("bad temp {:?}", now.temp)))?;

        let wind = if now.wind_scale.is_empty() {
            now.wind_dir
        } else {
            format!("{}{}级", now.wind_dir, now.wind_scale)
        };

        Ok(WeatherSnapshot {
            city: self.city.clone(),
            temp_low: temp,
            temp_high: None,
            condition: now.text,
            wind,
        })
    }
}

#[async_trait]
impl MetricSource<WeatherSnapshot> for QWeatherSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(location = %self.location))]
    async fn fetch(&self) -> Result<WeatherSnapshot, ReportError> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| ReportError::ConfigMissing("HEFENG_KEY".to_string()))?;
        let url = format!(
            "{}/v7/weather/now?location={}&key={}",
            self.base_url, self.location, key
        );
        let response: NowResponse = self.http.get_json(NAME, &url, &[]).await?;
        self.parse(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn source(host: &str, key: Option<&str>) -> QWeatherSource {
        let http = Arc::new(HttpFetcher::new(Duration::from_secs(5), "test").unwrap());
        QWeatherSource::new(http, host, "101280301", key.map(String::from), "惠州")
    }

    #[test]
    fn test_bare_host_gets_https() {
        assert_eq!(source("devapi.qweather.com", None).base_url, "https://devapi.qweather.com");
        assert_eq!(source("http://127.0.0.1:1234/", None).base_url, "http://127.0.0.1:1234");
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{"code":"200","now":{"temp":"26","text":"多云","windDir":"东北风","windScale":"3"}}"#;
        let snap = source("h", None).parse(serde_json::from_str(body).unwrap()).unwrap();
        assert_eq!(snap.temp_low, 26.0);
        assert_eq!(snap.condition, "多云");
        assert_eq!(snap.wind, "东北风3级");
        assert_eq!(snap.summary(), "多云 26°C");
    }

    #[test]
    fn test_provider_code_is_failure() {
        let body = r#"{"code":"401"}"#;
        let err = source("h", None).parse(serde_json::from_str(body).unwrap()).unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling() {
        let err = source("http://127.0.0.1:9", None).fetch().await.unwrap_err();
        assert!(matches!(err, ReportError::ConfigMissing(_)));
    }
}

//! Configuration Module - TOML-based Report Configuration
//!
//! Loads and validates configuration from `config.toml`. Provider
//! endpoints, source priority lists, sanity ranges, defaults and
//! timeouts are externalized here - nothing is hardcoded in the
//! domain layer. Secrets never live in the file; they come from the
//! environment via `credentials`.

pub mod credentials;
pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::{MetricKind, MetricSpec, ValueRange};

/// Top-level report configuration.
///
/// Every section has defaults, so an empty or absent file yields a
/// working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Run identity, logging and worker pool.
    #[serde(default)]
    pub report: ReportConfig,
    /// Provider endpoints and identifiers.
    #[serde(default)]
    pub providers: ProviderConfig,
    /// Push-notification API settings.
    #[serde(default)]
    pub push: PushConfig,
    /// Coarse per-pipeline timeouts.
    #[serde(default)]
    pub pipelines: PipelineTimeouts,
    /// Per-metric source priority, ranges and defaults.
    #[serde(default)]
    pub metrics: MetricsTable,
    /// Prometheus textfile export.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (production).
    #[default]
    Json,
    /// Human-readable (interactive use).
    Pretty,
}

/// Run identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Human-readable report name.
    #[serde(default = "default_name")]
    pub name: String,
    /// City label used for the weather entry.
    #[serde(default = "default_city")]
    pub city: String,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Parallel workers for the fan-out (at least one per pipeline).
    #[serde(default = "default_worker_pool")]
    pub worker_pool_size: usize,
    /// Per-request timeout for every source call (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Assemble and log the report without dispatching it.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            city: default_city(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            worker_pool_size: default_worker_pool(),
            request_timeout_secs: default_request_timeout(),
            dry_run: false,
        }
    }
}

impl ReportConfig {
    /// Per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Provider endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// QWeather API host (overridden by `HEFENG_HOST`).
    pub qweather_host: String,
    /// QWeather location id for the configured city.
    pub weather_location: String,
    /// Regional forecast page scraped as weather fallback.
    pub weather_cn_url: String,
    /// Sina quote service base URL.
    pub sina_url: String,
    /// Yahoo Finance chart API base URL.
    pub yahoo_url: String,
    /// Xueqiu quote API base URL.
    pub xueqiu_url: String,
    /// China Securities Index API base URL.
    pub csindex_url: String,
    /// Eastmoney data center base URL.
    pub eastmoney_url: String,
    /// Tushare Pro API URL.
    pub tushare_url: String,
    /// Browser-like user agent sent to scraping-sensitive providers.
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            qweather_host: "devapi.qweather.com".to_string(),
            weather_location: "101280301".to_string(),
            weather_cn_url: "http://www.weather.com.cn/textFC/hz.shtml".to_string(),
            sina_url: "https://hq.sinajs.cn".to_string(),
            yahoo_url: "https://query1.finance.yahoo.com".to_string(),
            xueqiu_url: "https://stock.xueqiu.com".to_string(),
            csindex_url: "https://www.csindex.com.cn".to_string(),
            eastmoney_url: "https://datacenter.eastmoney.com".to_string(),
            tushare_url: "http://api.tushare.pro".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

/// Push-notification API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// API base URL.
    pub api_base: String,
    /// Link attached to the template message.
    pub link_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.weixin.qq.com".to_string(),
            link_url: "https://weixin.qq.com".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Coarse bound on each pipeline, covering all its fallback attempts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineTimeouts {
    /// Weather pipeline (seconds).
    pub weather_secs: u64,
    /// Chinese indices + PE pipeline (seconds).
    pub china_equity_secs: u64,
    /// Bond yield pipeline (seconds).
    pub bond_secs: u64,
    /// US indices pipeline (seconds).
    pub us_equity_secs: u64,
    /// FX pipeline (seconds).
    pub fx_secs: u64,
    /// Crypto pipeline (seconds).
    pub crypto_secs: u64,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            weather_secs: 15,
            china_equity_secs: 25,
            bond_secs: 15,
            us_equity_secs: 30,
            fx_secs: 15,
            crypto_secs: 20,
        }
    }
}

impl PipelineTimeouts {
    /// All bounds with their names, for validation.
    pub fn named(&self) -> [(&'static str, u64); 6] {
        [
            ("weather", self.weather_secs),
            ("china_equity", self.china_equity_secs),
            ("bond", self.bond_secs),
            ("us_equity", self.us_equity_secs),
            ("fx", self.fx_secs),
            ("crypto", self.crypto_secs),
        ]
    }
}

/// Source chain + sanity filter for one metric.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
    /// Source names in priority order (first = highest).
    pub sources: Vec<String>,
    /// Acceptable minimum (inclusive).
    pub min: f64,
    /// Acceptable maximum (inclusive).
    pub max: f64,
    /// Safe default when every source fails. Absent = propagate failure.
    pub default: Option<f64>,
}

impl MetricConfig {
    fn new(sources: &[&str], min: f64, max: f64, default: Option<f64>) -> Self {
        Self {
            sources: sources.iter().map(|s| (*s).to_string()).collect(),
            min,
            max,
            default,
        }
    }

    /// Build the domain spec for `kind`.
    pub fn spec(&self, kind: MetricKind) -> MetricSpec {
        let spec = MetricSpec::new(kind, ValueRange::new(self.min, self.max));
        match self.default {
            Some(d) => spec.with_default(d),
            None => spec,
        }
    }
}

/// Per-metric configuration table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsTable {
    /// Current weather.
    pub weather: MetricConfig,
    /// Chinese index levels.
    pub index_level: MetricConfig,
    /// CSI 300 PE.
    pub pe_ratio: MetricConfig,
    /// 10-year bond yield.
    pub bond_yield: MetricConfig,
    /// US index levels.
    pub us_index: MetricConfig,
    /// USD/CNY.
    pub fx_rate: MetricConfig,
    /// BTC/ETH spot.
    pub crypto_price: MetricConfig,
}

impl Default for MetricsTable {
    fn default() -> Self {
        Self {
            weather: MetricConfig::new(&["qweather", "weather_cn"], -60.0, 60.0, None),
            index_level: MetricConfig::new(&["sina", "yahoo"], 1.0, 1_000_000.0, None),
            pe_ratio: MetricConfig::new(&["tushare", "csindex", "xueqiu"], 5.0, 30.0, Some(13.5)),
            bond_yield: MetricConfig::new(&["eastmoney", "tushare"], 0.5, 10.0, Some(2.65)),
            us_index: MetricConfig::new(&["yahoo"], 1.0, 1_000_000.0, None),
            fx_rate: MetricConfig::new(&["yahoo"], 5.0, 10.0, Some(7.25)),
            crypto_price: MetricConfig::new(
                &["yahoo_realtime", "yahoo_history"],
                1.0,
                10_000_000.0,
                None,
            ),
        }
    }
}

impl MetricsTable {
    /// Config for a metric kind.
    pub fn get(&self, kind: MetricKind) -> &MetricConfig {
        match kind {
            MetricKind::Weather => &self.weather,
            MetricKind::IndexLevel => &self.index_level,
            MetricKind::PeRatio => &self.pe_ratio,
            MetricKind::BondYield => &self.bond_yield,
            MetricKind::UsIndex => &self.us_index,
            MetricKind::FxRate => &self.fx_rate,
            MetricKind::CryptoPrice => &self.crypto_price,
        }
    }
}

/// Prometheus textfile export configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Write the text exposition here after each run.
    pub textfile_path: Option<String>,
}

/// Source names each metric's chain may reference.
pub fn known_sources(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::Weather => &["qweather", "weather_cn"],
        MetricKind::IndexLevel => &["sina", "yahoo"],
        MetricKind::PeRatio => &["tushare", "csindex", "xueqiu"],
        MetricKind::BondYield => &["eastmoney", "tushare"],
        MetricKind::UsIndex | MetricKind::FxRate => &["yahoo"],
        MetricKind::CryptoPrice => &["yahoo_realtime", "yahoo_history"],
    }
}

// Default value functions for serde

fn default_name() -> String {
    "daily-market-report".to_string()
}

fn default_city() -> String {
    "惠州".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_worker_pool() -> usize {
    6
}

fn default_request_timeout() -> u64 {
    10
}

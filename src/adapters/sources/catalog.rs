//! Source Catalog - Configured Names to Resolver Chains
//!
//! Turns the `[metrics.*]` source lists into `FallbackResolver`
//! chains. Priority is the order of names in configuration, so
//! reordering or dropping a provider never needs a code change.

use std::sync::Arc;

use anyhow::Result;

use crate::adapters::http::HttpFetcher;
use crate::adapters::sources::csindex::CsIndexPeSource;
use crate::adapters::sources::eastmoney::EastmoneyBondSource;
use crate::adapters::sources::qweather::QWeatherSource;
use crate::adapters::sources::sina::SinaIndexSource;
use crate::adapters::sources::tushare::TushareSource;
use crate::adapters::sources::weather_cn::WeatherCnSource;
use crate::adapters::sources::xueqiu::XueqiuPeSource;
use crate::adapters::sources::yahoo::{PriceField, YahooPriceSource, YahooQuoteSource};
use crate::config::credentials::Credentials;
use crate::config::{AppConfig, ProviderConfig};
use crate::domain::{IndexQuote, Measured, MetricKind, WeatherSnapshot};
use crate::error::ReportError;
use crate::ports::MetricSource;
use crate::usecases::collector::PipelineSet;
use crate::usecases::fallback::{FallbackResolver, FromDefault};

/// Provider symbols for one index across providers.
#[derive(Debug, Clone, Copy)]
pub struct IndexSymbols {
    /// Sina symbol (e.g. "sh000001").
    pub sina: &'static str,
    /// Yahoo symbol (e.g. "000001.SS").
    pub yahoo: &'static str,
}

/// Shanghai Composite.
pub const SH_COMPOSITE: IndexSymbols = IndexSymbols {
    sina: "sh000001",
    yahoo: "000001.SS",
};

/// CSI 300.
pub const CSI_300: IndexSymbols = IndexSymbols {
    sina: "sh000300",
    yahoo: "000300.SS",
};

/// Factory for every provider adapter.
pub struct SourceCatalog {
    http: Arc<HttpFetcher>,
    credentials: Credentials,
    config: AppConfig,
}

impl SourceCatalog {
    /// Build the shared HTTP client and the catalog.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        let http = Arc::new(HttpFetcher::new(
            config.report.request_timeout(),
            &config.providers.user_agent,
        )?);
        Ok(Self::with_http(http, config, credentials))
    }

    /// Build the catalog around an existing client.
    pub fn with_http(
        http: Arc<HttpFetcher>,
        config: &AppConfig,
        credentials: &Credentials,
    ) -> Self {
        Self {
            http,
            credentials: credentials.clone(),
            config: config.clone(),
        }
    }

    fn unknown(kind: MetricKind, name: &str) -> ReportError {
        ReportError::ConfigMissing(format!("no adapter named '{name}' for {kind}"))
    }

    /// Weather adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn weather(
        &self,
        name: &str,
    ) -> Result<Arc<dyn MetricSource<WeatherSnapshot>>, ReportError> {
        let p: &ProviderConfig = &self.config.providers;
        match name {
            "qweather" => {
                let host = self
                    .credentials
                    .hefeng_host
                    .as_deref()
                    .unwrap_or(&p.qweather_host);
                Ok(Arc::new(QWeatherSource::new(
                    self.http.clone(),
                    host,
                    p.weather_location.clone(),
                    self.credentials.hefeng_key.clone(),
                    self.config.report.city.clone(),
                )))
            }
            "weather_cn" => Ok(Arc::new(WeatherCnSource::new(
                self.http.clone(),
                p.weather_cn_url.clone(),
                self.config.report.city.clone(),
            ))),
            other => Err(Self::unknown(MetricKind::Weather, other)),
        }
    }

    /// Chinese index adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn china_index(
        &self,
        name: &str,
        symbols: IndexSymbols,
    ) -> Result<Arc<dyn MetricSource<IndexQuote>>, ReportError> {
        let p: &ProviderConfig = &self.config.providers;
        match name {
            "sina" => Ok(Arc::new(SinaIndexSource::new(
                self.http.clone(),
                &p.sina_url,
                symbols.sina,
            ))),
            "yahoo" => Ok(Arc::new(YahooQuoteSource::new(
                self.http.clone(),
                &p.yahoo_url,
                symbols.yahoo,
            ))),
            other => Err(Self::unknown(MetricKind::IndexLevel, other)),
        }
    }

    /// CSI 300 PE adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn pe_ratio(&self, name: &str) -> Result<Arc<dyn MetricSource<f64>>, ReportError> {
        let p: &ProviderConfig = &self.config.providers;
        let token = self.credentials.tushare_token.clone();
        match name {
            "tushare" => Ok(Arc::new(TushareSource::pe_ttm(
                self.http.clone(),
                &p.tushare_url,
                token,
            ))),
            "csindex" => Ok(Arc::new(CsIndexPeSource::new(
                self.http.clone(),
                &p.csindex_url,
                "000300",
            ))),
            "xueqiu" => Ok(Arc::new(XueqiuPeSource::new(
                self.http.clone(),
                &p.xueqiu_url,
                "SH000300",
            ))),
            other => Err(Self::unknown(MetricKind::PeRatio, other)),
        }
    }

    /// 10-year yield adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn bond_yield(&self, name: &str) -> Result<Arc<dyn MetricSource<f64>>, ReportError> {
        let p: &ProviderConfig = &self.config.providers;
        let token = self.credentials.tushare_token.clone();
        match name {
            "eastmoney" => Ok(Arc::new(EastmoneyBondSource::new(
                self.http.clone(),
                &p.eastmoney_url,
            ))),
            "tushare" => Ok(Arc::new(TushareSource::bond_10y(
                self.http.clone(),
                &p.tushare_url,
                token,
            ))),
            other => Err(Self::unknown(MetricKind::BondYield, other)),
        }
    }

    /// US index adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn us_index(
        &self,
        name: &str,
        symbol: &'static str,
    ) -> Result<Arc<dyn MetricSource<IndexQuote>>, ReportError> {
        match name {
            "yahoo" => Ok(Arc::new(YahooQuoteSource::new(
                self.http.clone(),
                &self.config.providers.yahoo_url,
                symbol,
            ))),
            other => Err(Self::unknown(MetricKind::UsIndex, other)),
        }
    }

    /// USD/CNY adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn fx_rate(&self, name: &str) -> Result<Arc<dyn MetricSource<f64>>, ReportError> {
        match name {
            "yahoo" => Ok(Arc::new(YahooPriceSource::new(
                self.http.clone(),
                &self.config.providers.yahoo_url,
                "USDCNY=X",
                PriceField::LastClose,
                "yahoo",
            ))),
            other => Err(Self::unknown(MetricKind::FxRate, other)),
        }
    }

    /// Crypto price adapter by name.
    ///
    /// # Errors
    /// `ConfigMissing` for an unknown name.
    pub fn crypto(
        &self,
        name: &str,
        symbol: &'static str,
    ) -> Result<Arc<dyn MetricSource<f64>>, ReportError> {
        let field = match name {
            "yahoo_realtime" => PriceField::Realtime,
            "yahoo_history" => PriceField::LastClose,
            other => return Err(Self::unknown(MetricKind::CryptoPrice, other)),
        };
        let label = if field == PriceField::Realtime {
            "yahoo_realtime"
        } else {
            "yahoo_history"
        };
        Ok(Arc::new(YahooPriceSource::new(
            self.http.clone(),
            &self.config.providers.yahoo_url,
            symbol,
            field,
            label,
        )))
    }

    /// Assemble the chain for `kind` from its configured source list.
    ///
    /// # Errors
    /// The first unknown source name.
    pub fn chain<T, F>(&self, kind: MetricKind, make: F) -> Result<FallbackResolver<T>, ReportError>
    where
        T: Measured + FromDefault + Clone + Send + Sync + 'static,
        F: Fn(&str) -> Result<Arc<dyn MetricSource<T>>, ReportError>,
    {
        let metric = self.config.metrics.get(kind);
        let mut resolver =
            FallbackResolver::new(metric.spec(kind), self.config.report.request_timeout());
        for (rank, name) in metric.sources.iter().enumerate() {
            resolver.push_ranked(rank, make(name)?);
        }
        Ok(resolver)
    }

    /// Weather chain.
    ///
    /// # Errors
    /// Unknown source names.
    pub fn weather_chain(&self) -> Result<FallbackResolver<WeatherSnapshot>, ReportError> {
        self.chain(MetricKind::Weather, |n| self.weather(n))
    }

    /// PE chain.
    ///
    /// # Errors
    /// Unknown source names.
    pub fn pe_chain(&self) -> Result<FallbackResolver<f64>, ReportError> {
        self.chain(MetricKind::PeRatio, |n| self.pe_ratio(n))
    }

    /// Bond yield chain.
    ///
    /// # Errors
    /// Unknown source names.
    pub fn bond_chain(&self) -> Result<FallbackResolver<f64>, ReportError> {
        self.chain(MetricKind::BondYield, |n| self.bond_yield(n))
    }

    /// Every chain the report needs.
    ///
    /// # Errors
    /// Unknown source names.
    pub fn pipelines(&self) -> Result<PipelineSet, ReportError> {
        Ok(PipelineSet {
            weather: self.weather_chain()?,
            sh_index: self.chain(MetricKind::IndexLevel, |n| self.china_index(n, SH_COMPOSITE))?,
            hs300: self.chain(MetricKind::IndexLevel, |n| self.china_index(n, CSI_300))?,
            pe_ratio: self.pe_chain()?,
            bond_yield: self.bond_chain()?,
            dji: self.chain(MetricKind::UsIndex, |n| self.us_index(n, "^DJI"))?,
            nasdaq: self.chain(MetricKind::UsIndex, |n| self.us_index(n, "^IXIC"))?,
            sp500: self.chain(MetricKind::UsIndex, |n| self.us_index(n, "^GSPC"))?,
            usd_cny: self.chain(MetricKind::FxRate, |n| self.fx_rate(n))?,
            bitcoin: self.chain(MetricKind::CryptoPrice, |n| self.crypto(n, "BTC-USD"))?,
            ethereum: self.chain(MetricKind::CryptoPrice, |n| self.crypto(n, "ETH-USD"))?,
        })
    }
}

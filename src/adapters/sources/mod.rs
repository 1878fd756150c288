//! Provider adapters - one module per external data provider.
//!
//! Each adapter implements `MetricSource<T>` for one metric with all
//! identifying parameters (symbol, location) fixed at construction.
//! `catalog` maps configured source names to adapters and assembles
//! the resolver chains.

pub mod catalog;
pub mod csindex;
pub mod eastmoney;
pub mod qweather;
pub mod sina;
pub mod tushare;
pub mod weather_cn;
pub mod xueqiu;
pub mod yahoo;

pub use catalog::SourceCatalog;

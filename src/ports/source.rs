//! Metric Source Port - One Provider for One Metric
//!
//! Defines the Source Adapter contract: a single attempt against a
//! single external provider that yields a canonical value or a
//! failure reason. Implementations never retry internally and never
//! panic past their own boundary; the Fallback Resolver owns ordering,
//! per-call timeouts and range validation.

use async_trait::async_trait;

use crate::error::ReportError;

/// Trait for metric data providers.
///
/// `T` is the canonical value type for the metric (`f64`,
/// `IndexQuote`, `WeatherSnapshot`). Adapters are constructed with
/// all identifying parameters (symbol, location) fixed, so `fetch`
/// takes no arguments.
#[async_trait]
pub trait MetricSource<T>: Send + Sync + 'static {
    /// Short provider name used in logs, telemetry and report origins.
    fn name(&self) -> &str;

    /// Attempt one call to the provider and parse its response.
    ///
    /// # Errors
    /// - `SourceUnavailable` for transport errors, non-2xx status or a
    ///   provider-reported error code
    /// - `ParseFailure` when the response shape is unexpected
    /// - `ConfigMissing` when the adapter lacks a credential
    async fn fetch(&self) -> Result<T, ReportError>;
}

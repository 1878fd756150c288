//! Metric definitions and sanity ranges.
//!
//! A metric is one named quantity the report carries. Each metric has
//! an acceptable numeric range used as a sanity filter on every parsed
//! provider value, and optionally a safe default used when every
//! source in its chain fails.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// The kinds of quantity the report acquires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Current weather for the configured city.
    Weather,
    /// Chinese equity index close + change.
    IndexLevel,
    /// CSI 300 price/earnings ratio.
    PeRatio,
    /// China 10-year government bond yield (percent).
    BondYield,
    /// US equity index close + change.
    UsIndex,
    /// USD/CNY exchange rate.
    FxRate,
    /// Crypto spot price in USD.
    CryptoPrice,
}

impl MetricKind {
    /// Every metric kind, in report order.
    pub const ALL: [Self; 7] = [
        Self::Weather,
        Self::IndexLevel,
        Self::PeRatio,
        Self::BondYield,
        Self::UsIndex,
        Self::FxRate,
        Self::CryptoPrice,
    ];

    /// Stable name used in config keys, logs and telemetry labels.
    pub fn name(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::IndexLevel => "index_level",
            Self::PeRatio => "pe_ratio",
            Self::BondYield => "bond_yield",
            Self::UsIndex => "us_index",
            Self::FxRate => "fx_rate",
            Self::CryptoPrice => "crypto_price",
        }
    }

    /// Unit shown in operator output.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Weather => "°C",
            Self::IndexLevel | Self::UsIndex => "pts",
            Self::PeRatio => "x",
            Self::BondYield => "%",
            Self::FxRate => "CNY",
            Self::CryptoPrice => "USD",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive acceptable range for a metric's measured value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound (inclusive).
    pub min: f64,
    /// Upper bound (inclusive).
    pub max: f64,
}

impl ValueRange {
    /// Create a new range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` is finite and within the range.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// A metric together with its sanity filter and default policy.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    /// Which metric this is.
    pub kind: MetricKind,
    /// Acceptable range of the measured value.
    pub range: ValueRange,
    /// Safe estimate substituted when every source fails.
    pub default: Option<f64>,
}

impl MetricSpec {
    /// Create a spec without a default (failures propagate).
    pub fn new(kind: MetricKind, range: ValueRange) -> Self {
        Self {
            kind,
            range,
            default: None,
        }
    }

    /// Attach a safe default value.
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    /// Reject values outside the acceptable range.
    ///
    /// # Errors
    /// Returns `ReportError::InvalidValue` carrying the first extreme
    /// that is not finite or falls outside `range`.
    pub fn validate<T: Measured>(&self, value: &T) -> Result<(), ReportError> {
        let (low, high) = value.extremes();
        match [low, high].into_iter().find(|v| !self.range.contains(*v)) {
            None => Ok(()),
            Some(bad) => Err(ReportError::InvalidValue {
                metric: self.kind.name().to_string(),
                value: bad,
                min: self.range.min,
                max: self.range.max,
            }),
        }
    }
}

/// Values that expose a single number for range validation.
pub trait Measured {
    /// Headline number, used for logging and defaults.
    fn measure(&self) -> f64;

    /// `(low, high)` bounds checked against the metric's range.
    fn extremes(&self) -> (f64, f64) {
        let m = self.measure();
        (m, m)
    }
}

impl Measured for f64 {
    fn measure(&self) -> f64 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pe_outside_range_is_invalid() {
        let spec = MetricSpec::new(MetricKind::PeRatio, ValueRange::new(5.0, 30.0));
        let err = spec.validate(&120.0).unwrap_err();
        assert!(matches!(err, ReportError::InvalidValue { value, .. } if value == 120.0));
        assert!(spec.validate(&13.5).is_ok());
    }

    #[test]
    fn test_nan_never_in_range() {
        let range = ValueRange::new(f64::MIN, f64::MAX);
        assert!(!range.contains(f64::NAN));
        assert!(!range.contains(f64::INFINITY));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let range = ValueRange::new(5.0, 30.0);
        assert!(range.contains(5.0));
        assert!(range.contains(30.0));
        assert!(!range.contains(30.000_1));
    }
}

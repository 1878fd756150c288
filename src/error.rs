//! Report Errors - Failure Taxonomy for Acquisition and Delivery
//!
//! Every Source Adapter, Fallback Resolver and the push gateway return
//! `ReportError` instead of panicking or bubbling raw transport errors.
//! Bootstrap code (config loading, CLI wiring) uses `anyhow` on top.

use thiserror::Error;

/// Failure reasons for one report run.
///
/// The enum is `Clone` so that resolver attempt logs can keep the
/// reason of every failed source alongside the final outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    /// Network error, timeout, non-2xx status or provider-reported error.
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable {
        /// Source adapter name (e.g. "sina").
        source_name: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Parsed value lies outside the metric's acceptable range.
    #[error("{metric} value {value} outside acceptable range [{min}, {max}]")]
    InvalidValue {
        /// Metric name.
        metric: String,
        /// Offending value.
        value: f64,
        /// Range lower bound (inclusive).
        min: f64,
        /// Range upper bound (inclusive).
        max: f64,
    },

    /// Response shape did not match what the adapter expects.
    #[error("unexpected response from {source_name}: {reason}")]
    ParseFailure {
        /// Source adapter name.
        source_name: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// A required credential or setting is absent.
    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    /// Risk premium math on unusable inputs.
    #[error("calculation failed: {0}")]
    CalculationFailure(String),

    /// Push endpoint rejected the request.
    #[error("push rejected with code {code}: {message}")]
    DispatchFailure {
        /// Provider error code (`errcode`).
        code: i64,
        /// Provider error message (`errmsg`).
        message: String,
        /// Operator-facing hint for known codes.
        hint: Option<String>,
    },

    /// Every source in a chain failed and the metric has no safe default.
    #[error("all {attempts} sources failed for {metric}")]
    Exhausted {
        /// Metric name.
        metric: String,
        /// Number of sources tried.
        attempts: usize,
    },
}

impl ReportError {
    /// Shorthand for a `SourceUnavailable` error.
    pub fn unavailable(source_name: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `ParseFailure` error.
    pub fn parse(source_name: &str, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Short label used for telemetry outcome labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "unavailable",
            Self::InvalidValue { .. } => "invalid",
            Self::ParseFailure { .. } => "parse",
            Self::ConfigMissing(_) => "config",
            Self::CalculationFailure(_) => "calculation",
            Self::DispatchFailure { .. } => "dispatch",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_source() {
        let err = ReportError::unavailable("sina", "timed out after 10000ms");
        assert_eq!(
            err.to_string(),
            "source sina unavailable: timed out after 10000ms"
        );
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ReportError::InvalidValue {
            metric: "pe_ratio".into(),
            value: 120.0,
            min: 5.0,
            max: 30.0,
        };
        assert!(err.to_string().contains("120"));
        assert_eq!(err.kind(), "invalid");
    }
}

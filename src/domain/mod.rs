//! Domain layer - Core report model and pure calculations.
//!
//! This module contains the pure logic of the daily report: metric
//! definitions and sanity ranges, acquired value types, display
//! formatting, the report itself and the risk premium formula.
//! No I/O here (hexagonal architecture inner ring).

pub mod metric;
pub mod quote;
pub mod report;
pub mod risk_premium;

// Re-export core types for convenience
pub use metric::{Measured, MetricKind, MetricSpec, ValueRange};
pub use quote::{IndexQuote, WeatherSnapshot};
pub use report::{EntryOrigin, Report, ReportBuilder, ReportEntry, ReportField, FETCH_FAILED};
pub use risk_premium::{format_risk_premium, risk_premium, CALCULATION_FAILED};

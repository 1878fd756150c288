//! Report - The Complete Keyed Set of Display Values for One Run
//!
//! A report always holds an entry for every field. Fields nobody
//! filled are set to the fetch-failed sentinel when the builder is
//! finished, so the push payload shape is complete even on total
//! failure. Once built, a report is immutable.

use std::collections::BTreeMap;

use serde::Serialize;

/// Recipient-facing text when no source produced a value.
pub const FETCH_FAILED: &str = "获取失败";

/// One named value field of the push template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    Date,
    Weather,
    ShIndex,
    Hs300,
    Bond10y,
    RiskPremium,
    UsdCny,
    Dji,
    Nasdaq,
    Sp500,
    Bitcoin,
    Ethereum,
}

impl ReportField {
    /// Every field, in template order.
    pub const ALL: [Self; 12] = [
        Self::Date,
        Self::Weather,
        Self::ShIndex,
        Self::Hs300,
        Self::Bond10y,
        Self::RiskPremium,
        Self::UsdCny,
        Self::Dji,
        Self::Nasdaq,
        Self::Sp500,
        Self::Bitcoin,
        Self::Ethereum,
    ];

    /// Template data key.
    pub fn key(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Weather => "weather",
            Self::ShIndex => "sh_index",
            Self::Hs300 => "hs300",
            Self::Bond10y => "bond_10y",
            Self::RiskPremium => "risk_premium",
            Self::UsdCny => "usd_cny",
            Self::Dji => "dji",
            Self::Nasdaq => "nasdaq",
            Self::Sp500 => "sp500",
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
        }
    }
}

impl std::fmt::Display for ReportField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Where an entry's value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Produced by the named source adapter.
    Source(String),
    /// Metric's configured safe default.
    Default,
    /// Derived from other entries (date, risk premium).
    Derived,
    /// Nothing usable; holds a sentinel string.
    Sentinel,
}

impl std::fmt::Display for EntryOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(name) => write!(f, "source:{name}"),
            Self::Default => f.write_str("default"),
            Self::Derived => f.write_str("derived"),
            Self::Sentinel => f.write_str("sentinel"),
        }
    }
}

/// A display string plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Formatted display string.
    pub value: String,
    /// Provenance of the value.
    pub origin: EntryOrigin,
}

impl ReportEntry {
    /// Entry carrying the fetch-failed sentinel.
    pub fn sentinel() -> Self {
        Self {
            value: FETCH_FAILED.to_string(),
            origin: EntryOrigin::Sentinel,
        }
    }
}

/// Immutable result of one acquisition run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    entries: BTreeMap<ReportField, ReportEntry>,
}

impl Report {
    /// Start assembling a report.
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Display value of a field.
    pub fn value(&self, field: ReportField) -> &str {
        self.entries
            .get(&field)
            .map_or(FETCH_FAILED, |e| e.value.as_str())
    }

    /// Full entry of a field.
    pub fn entry(&self, field: ReportField) -> Option<&ReportEntry> {
        self.entries.get(&field)
    }

    /// All entries in template order.
    pub fn entries(&self) -> impl Iterator<Item = (ReportField, &ReportEntry)> {
        self.entries.iter().map(|(f, e)| (*f, e))
    }

    /// Number of fields holding a sentinel.
    pub fn sentinel_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.origin == EntryOrigin::Sentinel)
            .count()
    }
}

/// Collects entries, then seals them into a complete `Report`.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    entries: BTreeMap<ReportField, ReportEntry>,
}

impl ReportBuilder {
    /// Set a field (last write wins).
    pub fn set(&mut self, field: ReportField, entry: ReportEntry) -> &mut Self {
        self.entries.insert(field, entry);
        self
    }

    /// Current display value of a field, if already set.
    pub fn peek(&self, field: ReportField) -> Option<&str> {
        self.entries.get(&field).map(|e| e.value.as_str())
    }

    /// Seal the report, filling every unset field with the sentinel.
    pub fn build(mut self) -> Report {
        for field in ReportField::ALL {
            self.entries.entry(field).or_insert_with(ReportEntry::sentinel);
        }
        Report {
            entries: self.entries,
        }
    }
}

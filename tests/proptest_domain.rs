//! Property-Based Tests - Domain Layer Invariants
//!
//! Uses `proptest` to verify that the report's pure calculations and
//! display formats hold across random inputs.

use proptest::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use daily_market_report::domain::quote::{format_usd, format_yield};
use daily_market_report::domain::risk_premium::parse_percentage;
use daily_market_report::domain::{
    format_risk_premium, risk_premium, EntryOrigin, IndexQuote, MetricKind, MetricSpec, Report,
    ReportEntry, ReportField, ValueRange, CALCULATION_FAILED,
};

// ── Risk Premium Properties ─────────────────────────────────

proptest! {
    /// Premium equals earnings yield minus bond yield, in percent.
    #[test]
    fn premium_matches_formula(
        pe in 5.0f64..30.0,
        bond in 0.5f64..10.0,
    ) {
        let text = format_yield(bond);
        let premium = risk_premium(pe, &text).unwrap().to_f64().unwrap();
        let bond_rounded = parse_percentage(&text).unwrap().to_f64().unwrap();
        let expected = 100.0 / pe - bond_rounded;
        prop_assert!(
            (premium - expected).abs() < 1e-9,
            "premium {premium} != expected {expected} (pe={pe}, bond={text})"
        );
    }

    /// Formatted premium always has three decimals and a percent sign.
    #[test]
    fn premium_format_three_decimals(
        pe in 1.0f64..200.0,
        bond in 0.0f64..15.0,
    ) {
        let text = format_risk_premium(Some(pe), &format_yield(bond));
        prop_assert!(text.ends_with('%'), "missing percent sign: {text}");
        let number = text.trim_end_matches('%');
        let decimals = number.split('.').nth(1).map_or(0, str::len);
        prop_assert_eq!(decimals, 3, "wrong precision: {}", text);
    }

    /// Non-positive PE never produces a number.
    #[test]
    fn premium_rejects_non_positive_pe(
        pe in -100.0f64..=0.0,
        bond in 0.5f64..10.0,
    ) {
        prop_assert_eq!(format_risk_premium(Some(pe), &format_yield(bond)), CALCULATION_FAILED);
    }
}

// ── Range Validation Properties ─────────────────────────────

proptest! {
    /// Validation accepts exactly the values inside the range.
    #[test]
    fn validate_agrees_with_range(
        min in -100.0f64..100.0,
        width in 0.0f64..100.0,
        value in -300.0f64..300.0,
    ) {
        let max = min + width;
        let spec = MetricSpec::new(MetricKind::PeRatio, ValueRange::new(min, max));
        let inside = value >= min && value <= max;
        prop_assert_eq!(spec.validate(&value).is_ok(), inside);
    }

    /// A quote is validated by its close.
    #[test]
    fn quote_validated_by_close(
        close in 0.0f64..20000.0,
        prev in 1.0f64..20000.0,
    ) {
        let spec = MetricSpec::new(MetricKind::IndexLevel, ValueRange::new(1000.0, 10000.0));
        let quote = IndexQuote::new(close, Some(prev));
        prop_assert_eq!(spec.validate(&quote).is_ok(), (1000.0..=10000.0).contains(&close));
    }
}

// ── Display Format Properties ───────────────────────────────

proptest! {
    /// Grouped USD text parses back to the rounded price.
    #[test]
    fn usd_grouping_round_trips(price in 0.0f64..1e9) {
        let text = format_usd(price);
        prop_assert!(text.starts_with('$'));
        let digits: String = text[1..].chars().filter(|c| *c != ',').collect();
        prop_assert_eq!(digits.parse::<f64>().unwrap(), price.round());
        for group in text[1..].split(',').skip(1) {
            prop_assert_eq!(group.len(), 3, "bad group in {}", text);
        }
    }

    /// Change sign in the summary follows the close vs previous close.
    #[test]
    fn quote_change_sign(
        close in 1.0f64..10000.0,
        prev in 1.0f64..10000.0,
    ) {
        let summary = IndexQuote::new(close, Some(prev)).summary();
        let change = IndexQuote::new(close, Some(prev)).change_pct();
        if change >= 0.005 {
            prop_assert!(summary.contains("(+"), "expected gain: {summary}");
        } else if change <= -0.005 {
            prop_assert!(summary.contains("(-"), "expected loss: {summary}");
        }
    }
}

// ── Report Completeness Properties ──────────────────────────

proptest! {
    /// Whatever subset of fields is set, the built report has all twelve.
    #[test]
    fn report_always_complete(mask in proptest::collection::vec(any::<bool>(), 12)) {
        let mut builder = Report::builder();
        for (field, set) in ReportField::ALL.into_iter().zip(&mask) {
            if *set {
                builder.set(field, ReportEntry {
                    value: "1.0".into(),
                    origin: EntryOrigin::Default,
                });
            }
        }
        let report = builder.build();
        let unset = mask.iter().filter(|s| !**s).count();
        prop_assert_eq!(report.entries().count(), 12);
        prop_assert_eq!(report.sentinel_count(), unset);
    }
}

//! Equity risk premium calculation.
//!
//! The premium is the CSI 300 earnings yield (1 / PE) minus the
//! 10-year government bond yield, expressed in percent:
//!
//! ```text
//! earnings_yield = 1 / pe
//! bond_fraction  = parse_percentage(yield) / 100
//! premium        = (earnings_yield - bond_fraction) * 100
//! ```
//!
//! Computed in `Decimal` so the 3-decimal output is stable across
//! platforms and never shows binary floating-point artefacts.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use crate::error::ReportError;

/// Recipient-facing text when the premium cannot be computed.
pub const CALCULATION_FAILED: &str = "计算失败";

/// Parse a percentage string such as `"2.650%"` or `" 2.65 "`.
///
/// # Errors
/// Returns `CalculationFailure` when the text is not a number.
pub fn parse_percentage(text: &str) -> Result<Decimal, ReportError> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number
        .parse::<Decimal>()
        .map_err(|_| ReportError::CalculationFailure(format!("not a percentage: {text:?}")))
}

/// Compute the risk premium in percent.
///
/// # Errors
/// Returns `CalculationFailure` when `pe` is zero, negative or not
/// finite, or when the yield text cannot be parsed.
pub fn risk_premium(pe: f64, bond_yield: &str) -> Result<Decimal, ReportError> {
    if !pe.is_finite() || pe <= 0.0 {
        return Err(ReportError::CalculationFailure(format!(
            "pe ratio must be positive, got {pe}"
        )));
    }
    let pe = Decimal::from_f64(pe).ok_or_else(|| {
        ReportError::CalculationFailure(format!("pe ratio {pe} not representable"))
    })?;
    let bond_fraction = parse_percentage(bond_yield)? / dec!(100);

    let earnings_yield = Decimal::ONE
        .checked_div(pe)
        .ok_or_else(|| ReportError::CalculationFailure("division overflow".to_string()))?;

    Ok((earnings_yield - bond_fraction) * dec!(100))
}

/// Format the premium as `"4.757%"`, or the failure sentinel.
///
/// `pe` is `None` when the PE chain produced no value at all.
pub fn format_risk_premium(pe: Option<f64>, bond_yield: &str) -> String {
    let Some(pe) = pe else {
        return CALCULATION_FAILED.to_string();
    };
    match risk_premium(pe, bond_yield) {
        Ok(premium) => {
            let rounded = premium.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero);
            format!("{rounded:.3}%")
        }
        Err(e) => {
            tracing::warn!(error = %e, pe, bond_yield, "Risk premium calculation failed");
            CALCULATION_FAILED.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_value() {
        assert_eq!(format_risk_premium(Some(13.5), "2.650%"), "4.757%");
    }

    #[test]
    fn test_zero_pe_is_sentinel() {
        assert_eq!(format_risk_premium(Some(0.0), "2.650%"), CALCULATION_FAILED);
        assert!(matches!(
            risk_premium(-3.0, "2.650%"),
            Err(ReportError::CalculationFailure(_))
        ));
    }

    #[test]
    fn test_unparseable_yield_is_sentinel() {
        assert_eq!(format_risk_premium(Some(13.5), "获取失败"), CALCULATION_FAILED);
        assert_eq!(format_risk_premium(Some(13.5), "%"), CALCULATION_FAILED);
    }

    #[test]
    fn test_missing_pe_is_sentinel() {
        assert_eq!(format_risk_premium(None, "2.650%"), CALCULATION_FAILED);
    }

    #[test]
    fn test_negative_premium_keeps_sign() {
        // 1/50 = 2% earnings yield vs 3% bond
        assert_eq!(format_risk_premium(Some(50.0), "3.000%"), "-1.000%");
    }

    #[test]
    fn test_parse_percentage_variants() {
        assert_eq!(parse_percentage("2.650%").unwrap(), dec!(2.650));
        assert_eq!(parse_percentage(" 1.799 ").unwrap(), dec!(1.799));
        assert!(parse_percentage("abc").is_err());
    }
}

//! Quantity policy for scanned lines
//!
//! Under enhanced verification every identifier stands for exactly one unit
//! of the line's unit of measure, whether or not the product is serial
//! tracked. Any attempt to record something else is reported, never
//! silently corrected.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::ExpectedLine;

/// A quantity that breaks the numeric policy
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantityPolicyError {
    #[error("quantity must be 1.0 per identifier under enhanced verification, got {attempted}")]
    MustBeOne { attempted: Decimal },

    #[error("quantity must be positive, got {attempted}")]
    NotPositive { attempted: Decimal },

    #[error("quantity {attempted} exceeds the {remaining} still expected on this line")]
    ExceedsExpected {
        attempted: Decimal,
        remaining: Decimal,
    },

    #[error("consumed quantity must be 0 or 1.0 under enhanced verification, got {attempted}")]
    NotUnitOrZero { attempted: Decimal },

    #[error("consumed quantity {attempted} is outside 0..={expected}")]
    OutOfRange {
        attempted: Decimal,
        expected: Decimal,
    },
}

/// Expected and consumed quantities a line ends up with after a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanQuantities {
    pub expected: Decimal,
    pub consumed: Decimal,
}

/// Quantities for a scan consuming an existing line.
///
/// Enhanced: both quantities become exactly 1. Otherwise the requested
/// quantity (default: one unit, or what is left when less than one) is added
/// to the consumed quantity, bounded by the expected quantity.
pub fn consume_quantities(
    line: &ExpectedLine,
    requested: Option<Decimal>,
    enhanced: bool,
) -> Result<ScanQuantities, QuantityPolicyError> {
    if enhanced {
        check_unit_quantity(requested)?;
        return Ok(ScanQuantities {
            expected: Decimal::ONE,
            consumed: Decimal::ONE,
        });
    }

    let remaining = line.remaining_qty();
    let attempted = requested.unwrap_or_else(|| Decimal::ONE.min(remaining));
    if attempted <= Decimal::ZERO {
        return Err(QuantityPolicyError::NotPositive { attempted });
    }
    if attempted > remaining {
        return Err(QuantityPolicyError::ExceedsExpected {
            attempted,
            remaining,
        });
    }
    Ok(ScanQuantities {
        expected: line.expected_qty,
        consumed: line.consumed_qty + attempted,
    })
}

/// Quantities for a line created by a free-registration scan
pub fn register_quantities(
    requested: Option<Decimal>,
    enhanced: bool,
) -> Result<ScanQuantities, QuantityPolicyError> {
    if enhanced {
        check_unit_quantity(requested)?;
        return Ok(ScanQuantities {
            expected: Decimal::ONE,
            consumed: Decimal::ONE,
        });
    }

    let attempted = requested.unwrap_or(Decimal::ONE);
    if attempted <= Decimal::ZERO {
        return Err(QuantityPolicyError::NotPositive { attempted });
    }
    Ok(ScanQuantities {
        expected: attempted,
        consumed: attempted,
    })
}

/// A requested per-scan quantity under enhanced verification must be 1.0
pub fn check_unit_quantity(requested: Option<Decimal>) -> Result<(), QuantityPolicyError> {
    match requested {
        Some(q) if q != Decimal::ONE => Err(QuantityPolicyError::MustBeOne { attempted: q }),
        _ => Ok(()),
    }
}

/// Validate a consumed quantity written directly by the host (line edit)
pub fn check_consumed_update(
    consumed: Decimal,
    expected: Decimal,
    enhanced: bool,
) -> Result<(), QuantityPolicyError> {
    if enhanced {
        if consumed != Decimal::ZERO && consumed != Decimal::ONE {
            return Err(QuantityPolicyError::NotUnitOrZero { attempted: consumed });
        }
        return Ok(());
    }
    if consumed < Decimal::ZERO || consumed > expected {
        return Err(QuantityPolicyError::OutOfRange {
            attempted: consumed,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(expected: &str, consumed: &str) -> ExpectedLine {
        let mut l = ExpectedLine::prefill(Uuid::nil(), Uuid::nil(), "kg", "LOT", dec(expected));
        l.consumed_qty = dec(consumed);
        l
    }

    #[test]
    fn test_enhanced_forces_unit() {
        let q = consume_quantities(&line("25", "0"), None, true).unwrap();
        assert_eq!(q.expected, Decimal::ONE);
        assert_eq!(q.consumed, Decimal::ONE);

        // "1.0" and "1" are the same quantity
        assert!(consume_quantities(&line("1", "0"), Some(dec("1.0")), true).is_ok());
    }

    #[test]
    fn test_enhanced_rejects_fraction() {
        assert_eq!(
            consume_quantities(&line("1", "0"), Some(dec("0.5")), true),
            Err(QuantityPolicyError::MustBeOne { attempted: dec("0.5") })
        );
        assert!(register_quantities(Some(dec("2")), true).is_err());
    }

    #[test]
    fn test_relaxed_defaults_to_one_unit() {
        let q = consume_quantities(&line("5", "2"), None, false).unwrap();
        assert_eq!(q.consumed, dec("3"));
        assert_eq!(q.expected, dec("5"));

        // less than a unit left: take what remains
        let q = consume_quantities(&line("2.5", "2"), None, false).unwrap();
        assert_eq!(q.consumed, dec("2.5"));
    }

    #[test]
    fn test_relaxed_bounds() {
        assert!(matches!(
            consume_quantities(&line("5", "4"), Some(dec("2")), false),
            Err(QuantityPolicyError::ExceedsExpected { .. })
        ));
        assert!(matches!(
            consume_quantities(&line("5", "0"), Some(dec("0")), false),
            Err(QuantityPolicyError::NotPositive { .. })
        ));
        assert_eq!(register_quantities(None, false).unwrap().consumed, Decimal::ONE);
    }

    #[test]
    fn test_consumed_update_policy() {
        assert!(check_consumed_update(Decimal::ZERO, Decimal::ONE, true).is_ok());
        assert!(check_consumed_update(Decimal::ONE, Decimal::ONE, true).is_ok());
        assert!(check_consumed_update(dec("0.3"), Decimal::ONE, true).is_err());
        assert!(check_consumed_update(dec("3"), dec("5"), false).is_ok());
        assert!(check_consumed_update(dec("6"), dec("5"), false).is_err());
    }
}

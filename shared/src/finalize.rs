//! Transfer-level check run before a transfer may be finalized

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expected::ExpectedSet;
use crate::models::ExpectedLine;
use crate::types::{display_identifier, LotKey};

/// Summary of a passed finalize check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    /// Pre-filled identifiers, consumed ones included
    pub expected: usize,
    /// Identifiers with consumed quantity on some line
    pub accepted: usize,
    /// True when nothing was pre-filled and the check did not apply
    pub skipped: bool,
}

/// Why a transfer cannot be finalized yet
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "lots", rename_all = "snake_case")]
pub enum FinalizeError {
    #[error("pre-filled lots not scanned: {}", .0.join(", "))]
    MissingScans(Vec<String>),

    #[error("scanned lots not in the pre-filled list: {}", .0.join(", "))]
    UnexpectedScans(Vec<String>),
}

impl FinalizeError {
    pub fn lots(&self) -> &[String] {
        match self {
            FinalizeError::MissingScans(lots) | FinalizeError::UnexpectedScans(lots) => lots,
        }
    }
}

/// The accepted set: every bound identifier with consumed quantity, keyed to
/// its display text
fn accepted_set(lines: &[ExpectedLine]) -> BTreeMap<LotKey, String> {
    let mut accepted = BTreeMap::new();
    for line in lines.iter().filter(|l| l.is_accepted()) {
        if let (Some(key), Some(name)) = (line.lot_key(), line.lot_name.as_deref()) {
            accepted.entry(key).or_insert_with(|| display_identifier(name));
        }
    }
    accepted
}

/// Check that the accepted identifiers are exactly the pre-filled ones.
///
/// Missing scans are reported before unexpected ones. Without any pre-fill
/// the check is skipped: whatever was freely registered may be finalized.
pub fn check_finalize(lines: &[ExpectedLine]) -> Result<FinalizeReport, FinalizeError> {
    let expected = ExpectedSet::build(lines);
    let accepted = accepted_set(lines);

    if expected.is_free_registration() {
        return Ok(FinalizeReport {
            expected: 0,
            accepted: accepted.len(),
            skipped: true,
        });
    }

    let expected_keys = expected.all();
    let accepted_keys: BTreeSet<LotKey> = accepted.keys().cloned().collect();

    let mut missing: Vec<String> = expected_keys
        .difference(&accepted_keys)
        .map(|k| expected.display(k).map(str::to_string).unwrap_or_else(|| k.to_string()))
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(FinalizeError::MissingScans(missing));
    }

    let mut unexpected: Vec<String> = accepted_keys
        .difference(&expected_keys)
        .map(|k| accepted[k].clone())
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        return Err(FinalizeError::UnexpectedScans(unexpected));
    }

    Ok(FinalizeReport {
        expected: expected_keys.len(),
        accepted: accepted_keys.len(),
        skipped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn prefill(lot: &str, consumed: i64) -> ExpectedLine {
        let mut line = ExpectedLine::prefill(Uuid::nil(), Uuid::nil(), "Units", lot, Decimal::ONE);
        line.consumed_qty = Decimal::from(consumed);
        line
    }

    fn scanned(lot: &str) -> ExpectedLine {
        ExpectedLine::registered(Uuid::nil(), Uuid::nil(), "Units", lot, Decimal::ONE)
    }

    #[test]
    fn test_missing_scans() {
        let lines = vec![prefill("LOT001", 1), prefill("LOT002", 0)];
        assert_eq!(
            check_finalize(&lines),
            Err(FinalizeError::MissingScans(vec!["LOT002".into()]))
        );
    }

    #[test]
    fn test_unexpected_scans() {
        let lines = vec![prefill("LOT001", 1), scanned("EXTRA")];
        assert_eq!(
            check_finalize(&lines),
            Err(FinalizeError::UnexpectedScans(vec!["EXTRA".into()]))
        );
    }

    #[test]
    fn test_missing_reported_first() {
        let lines = vec![prefill("LOT001", 0), scanned("EXTRA")];
        assert!(matches!(check_finalize(&lines), Err(FinalizeError::MissingScans(_))));
    }

    #[test]
    fn test_passes_on_equal_sets() {
        let lines = vec![prefill("LOT001", 1), prefill("lot002", 1)];
        let report = check_finalize(&lines).unwrap();
        assert_eq!(report.expected, 2);
        assert_eq!(report.accepted, 2);
        assert!(!report.skipped);
    }

    #[test]
    fn test_free_registration_skips() {
        let report = check_finalize(&[scanned("A"), scanned("B")]).unwrap();
        assert!(report.skipped);
        assert_eq!(report.accepted, 2);
        assert!(check_finalize(&[]).unwrap().skipped);
    }

    #[test]
    fn test_error_lists_lots() {
        let err = FinalizeError::MissingScans(vec!["A".into(), "B".into()]);
        assert_eq!(err.lots(), ["A".to_string(), "B".to_string()]);
        assert_eq!(err.to_string(), "pre-filled lots not scanned: A, B");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The check passes exactly when pre-filled and accepted sets are equal
        #[test]
        fn prop_passes_iff_sets_equal(
            prefilled in proptest::collection::btree_set("[A-E]", 1..5),
            scanned_mask in proptest::collection::vec(any::<bool>(), 5),
            extras in proptest::collection::btree_set("[F-H]", 0..3),
        ) {
            let mut lines = Vec::new();
            let mut accepted = BTreeSet::new();
            for (i, lot) in prefilled.iter().enumerate() {
                let consumed = scanned_mask[i % scanned_mask.len()];
                lines.push(prefill(lot, consumed as i64));
                if consumed {
                    accepted.insert(lot.clone());
                }
            }
            for lot in &extras {
                lines.push(scanned(lot));
                accepted.insert(lot.clone());
            }

            let equal = accepted == prefilled;
            prop_assert_eq!(check_finalize(&lines).is_ok(), equal);
        }
    }
}

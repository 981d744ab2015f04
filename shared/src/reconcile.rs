//! Scan decision state machine
//!
//! Pure half of reconciliation: given the transfer's lines and whether the
//! session Ledger already holds the identifier, decide what a scan does.
//! Persisting the decision and appending to the Ledger happen in the backend.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::expected::ExpectedSet;
use crate::models::{classify, ExpectedLine, LineRef, LotState, ReconciliationResult, ScanEvent, ScanOutcome};
use crate::types::{display_identifier, normalize, LotKey, LotKeyError};

/// Fallback unit label for lines registered without any sibling line
pub const DEFAULT_UOM: &str = "Units";

/// What a scan should do to the transfer
#[derive(Debug, Clone, PartialEq)]
pub enum ScanDecision {
    /// Nothing changes; report this to the operator
    Reject(ReconciliationResult),
    /// Consume the pending pre-fill line bound to the identifier
    Consume { key: LotKey, line: LineRef },
    /// Free registration: create a new line bound to the identifier
    Register {
        key: LotKey,
        lot_name: String,
        product_id: Uuid,
        uom: String,
    },
    /// Override re-scan of an identifier already consumed on `line`
    Reconfirm { key: LotKey, line: LineRef },
}

/// Decide a scan of `key` against `lines`.
///
/// Order of checks: an accepted identifier is a duplicate unless the event
/// carries the override; in pre-fill mode the identifier must be outstanding;
/// without any pre-fill the scan registers a new line.
pub fn decide(
    event: &ScanEvent,
    key: &LotKey,
    lines: &[ExpectedLine],
    in_ledger: bool,
) -> ScanDecision {
    let state = classify(key, lines, in_ledger);

    if let LotState::Accepted { line } = &state {
        if !event.allow_duplicate {
            return ScanDecision::Reject(ReconciliationResult::duplicate(key.clone()));
        }
        if let Some(line) = line {
            return ScanDecision::Reconfirm {
                key: key.clone(),
                line: line.clone(),
            };
        }
        // Ledger-only entry with nothing persisted behind it: the override
        // lets the scan through as if unseen.
    }

    let expected = ExpectedSet::build(lines);

    if expected.is_free_registration() {
        return register(event, key, lines);
    }

    if !expected.is_outstanding(key) {
        if expected.outstanding().is_empty() {
            return ScanDecision::Reject(ReconciliationResult::all_consumed(key.clone()));
        }
        let reason = format!(
            "lot {} is not in the pre-filled list for this transfer",
            display_identifier(&event.raw)
        );
        return ScanDecision::Reject(ReconciliationResult::not_expected(
            key.clone(),
            expected.outstanding_display(),
            reason,
        ));
    }

    let candidate = lines
        .iter()
        .filter(|l| l.binds(key) && l.is_prefill() && !l.is_fully_consumed())
        .find(|l| event.product_hint.map_or(true, |p| l.product_id == p));

    match candidate {
        Some(line) => ScanDecision::Consume {
            key: key.clone(),
            line: line.line_ref.clone(),
        },
        None => ScanDecision::Reject(ReconciliationResult::not_expected(
            key.clone(),
            expected.outstanding_display(),
            format!("lot {} is expected for a different product", key),
        )),
    }
}

fn register(event: &ScanEvent, key: &LotKey, lines: &[ExpectedLine]) -> ScanDecision {
    let product_id = match event.product_hint {
        Some(p) => p,
        None => {
            let mut products = lines
                .iter()
                .map(|l| l.product_id)
                .collect::<BTreeSet<Uuid>>()
                .into_iter();
            match (products.next(), products.next()) {
                (Some(p), None) => p,
                _ => {
                    return ScanDecision::Reject(ReconciliationResult::not_expected(
                        key.clone(),
                        Vec::new(),
                        "cannot register a new lot without knowing its product",
                    ))
                }
            }
        }
    };

    let uom = lines
        .iter()
        .find(|l| l.product_id == product_id)
        .map(|l| l.uom.clone())
        .unwrap_or_else(|| DEFAULT_UOM.to_string());

    ScanDecision::Register {
        key: key.clone(),
        lot_name: display_identifier(&event.raw),
        product_id,
        uom,
    }
}

/// Client-side pre-check against lists the client already holds.
///
/// Mirrors the server's first checks so a handheld can reject obvious
/// duplicates and typos without a round trip. `free_registration` is true
/// when the transfer has no pre-fill at all; an empty `outstanding` list
/// otherwise means every pre-filled lot is already consumed.
pub fn precheck(
    raw: &str,
    free_registration: bool,
    outstanding: &[String],
    accepted: &[String],
) -> Result<ScanOutcome, LotKeyError> {
    let key = normalize(raw)?;

    let is_in = |list: &[String]| list.iter().any(|s| normalize(s).ok().as_ref() == Some(&key));

    if is_in(accepted) {
        return Ok(ScanOutcome::RejectedDuplicate);
    }
    if free_registration || is_in(outstanding) {
        return Ok(ScanOutcome::Accepted);
    }
    if outstanding.is_empty() {
        return Ok(ScanOutcome::RejectedAllConsumed);
    }
    Ok(ScanOutcome::RejectedNotExpected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn op() -> Uuid {
        Uuid::from_u128(7)
    }

    fn product() -> Uuid {
        Uuid::from_u128(42)
    }

    fn prefill(lot: &str, consumed: i64) -> ExpectedLine {
        let mut line = ExpectedLine::prefill(op(), product(), "Units", lot, Decimal::ONE);
        line.consumed_qty = Decimal::from(consumed);
        line
    }

    fn key(s: &str) -> LotKey {
        normalize(s).unwrap()
    }

    #[test]
    fn test_prefill_match_is_consumed() {
        let lines = vec![prefill("LOT001", 0), prefill("LOT002", 0)];
        let event = ScanEvent::new(op(), "lot001 ");
        match decide(&event, &key("lot001 "), &lines, false) {
            ScanDecision::Consume { line, .. } => assert_eq!(line, lines[0].line_ref),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_has_priority() {
        let lines = vec![prefill("LOT001", 1), prefill("LOT002", 0)];
        let event = ScanEvent::new(op(), "LOT001");
        match decide(&event, &key("LOT001"), &lines, true) {
            ScanDecision::Reject(r) => assert_eq!(r.outcome, ScanOutcome::RejectedDuplicate),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_override_reconfirms_existing_line() {
        let lines = vec![prefill("LOT001", 1)];
        let event = ScanEvent::new(op(), "LOT001").allowing_duplicate();
        assert!(matches!(
            decide(&event, &key("LOT001"), &lines, true),
            ScanDecision::Reconfirm { .. }
        ));
    }

    #[test]
    fn test_not_expected_lists_outstanding() {
        let lines = vec![prefill("LOT001", 0)];
        let event = ScanEvent::new(op(), "LOT999");
        match decide(&event, &key("LOT999"), &lines, false) {
            ScanDecision::Reject(r) => {
                assert_eq!(r.outcome, ScanOutcome::RejectedNotExpected);
                assert_eq!(r.outstanding, vec!["LOT001".to_string()]);
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_all_consumed() {
        let lines = vec![prefill("LOT001", 1)];
        let event = ScanEvent::new(op(), "LOT777");
        match decide(&event, &key("LOT777"), &lines, false) {
            ScanDecision::Reject(r) => assert_eq!(r.outcome, ScanOutcome::RejectedAllConsumed),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_product_hint_mismatch() {
        let lines = vec![prefill("LOT001", 0)];
        let event = ScanEvent::new(op(), "LOT001").with_product(Uuid::from_u128(99));
        match decide(&event, &key("LOT001"), &lines, false) {
            ScanDecision::Reject(r) => assert_eq!(r.outcome, ScanOutcome::RejectedNotExpected),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_free_registration_uses_sole_product() {
        let mut unbound = prefill("x", 0);
        unbound.lot_name = None;
        unbound.uom = "Boxes".into();
        let event = ScanEvent::new(op(), " NewLot ");
        match decide(&event, &key("NEWLOT"), &[unbound], false) {
            ScanDecision::Register { lot_name, product_id, uom, .. } => {
                assert_eq!(lot_name, "NewLot");
                assert_eq!(product_id, product());
                assert_eq!(uom, "Boxes");
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_free_registration_without_product_is_rejected() {
        let event = ScanEvent::new(op(), "NEWLOT");
        assert!(matches!(
            decide(&event, &key("NEWLOT"), &[], false),
            ScanDecision::Reject(_)
        ));
        let hinted = event.with_product(product());
        assert!(matches!(
            decide(&hinted, &key("NEWLOT"), &[], false),
            ScanDecision::Register { .. }
        ));
    }

    #[test]
    fn test_precheck() {
        let outstanding = vec!["LOT001".to_string(), "LOT002".to_string()];
        let accepted = vec!["lot003".to_string()];
        assert_eq!(precheck(" lot001", false, &outstanding, &accepted), Ok(ScanOutcome::Accepted));
        assert_eq!(precheck("LOT003", false, &outstanding, &accepted), Ok(ScanOutcome::RejectedDuplicate));
        assert_eq!(precheck("LOT9", false, &outstanding, &accepted), Ok(ScanOutcome::RejectedNotExpected));
        assert_eq!(precheck("LOT9", true, &[], &accepted), Ok(ScanOutcome::Accepted));
        assert_eq!(precheck("  ", false, &outstanding, &accepted), Err(LotKeyError::Empty));
    }

    #[test]
    fn test_precheck_matches_decide_when_all_consumed() {
        let lines = vec![prefill("LOT001", 1)];
        let expected = ExpectedSet::build(&lines);
        let accepted = vec!["LOT001".to_string()];

        let client = precheck(
            "LOT777",
            expected.is_free_registration(),
            &expected.outstanding_display(),
            &accepted,
        );
        assert_eq!(client, Ok(ScanOutcome::RejectedAllConsumed));

        let event = ScanEvent::new(op(), "LOT777");
        match decide(&event, &key("LOT777"), &lines, false) {
            ScanDecision::Reject(r) => assert_eq!(r.outcome, ScanOutcome::RejectedAllConsumed),
            other => panic!("unexpected decision {:?}", other),
        }
    }
}

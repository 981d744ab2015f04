//! Scan events, outcomes and per-identifier scan state

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ExpectedLine, LineRef};
use crate::types::{LotKey, LotKeyError};

/// One barcode read (or typed identifier) against a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub operation_id: Uuid,
    pub raw: String,
    /// Restrict matching to lines of this product
    pub product_hint: Option<Uuid>,
    /// Operator explicitly confirmed re-scanning an accepted identifier
    #[serde(default)]
    pub allow_duplicate: bool,
    /// Quantity the client wants recorded; checked against the numeric policy
    pub quantity: Option<Decimal>,
    /// Scan straight into this package
    pub package_id: Option<Uuid>,
}

impl ScanEvent {
    pub fn new(operation_id: Uuid, raw: impl Into<String>) -> Self {
        Self {
            operation_id,
            raw: raw.into(),
            product_hint: None,
            allow_duplicate: false,
            quantity: None,
            package_id: None,
        }
    }

    pub fn with_product(mut self, product_id: Uuid) -> Self {
        self.product_hint = Some(product_id);
        self
    }

    pub fn allowing_duplicate(mut self) -> Self {
        self.allow_duplicate = true;
        self
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn into_package(mut self, package_id: Uuid) -> Self {
        self.package_id = Some(package_id);
        self
    }
}

/// Outcome tag of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Accepted,
    RejectedDuplicate,
    RejectedNotExpected,
    RejectedAllConsumed,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Accepted => "accepted",
            ScanOutcome::RejectedDuplicate => "rejected_duplicate",
            ScanOutcome::RejectedNotExpected => "rejected_not_expected",
            ScanOutcome::RejectedAllConsumed => "rejected_all_consumed",
        }
    }
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to one scan, with enough context to render a precise message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub outcome: ScanOutcome,
    /// Normalized identifier, absent when the scan text was unusable
    pub lot: Option<LotKey>,
    /// The line that absorbed the scan (accepted only)
    pub line: Option<ExpectedLine>,
    pub reason: String,
    /// Identifiers still waiting to be scanned, sorted, for display
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outstanding: Vec<String>,
}

impl ReconciliationResult {
    pub fn accepted(lot: LotKey, line: ExpectedLine, reason: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::Accepted,
            lot: Some(lot),
            line: Some(line),
            reason: reason.into(),
            outstanding: Vec::new(),
        }
    }

    pub fn duplicate(lot: LotKey) -> Self {
        let reason = format!(
            "lot {} has already been scanned on this transfer; confirm the override to scan it again",
            lot
        );
        Self {
            outcome: ScanOutcome::RejectedDuplicate,
            lot: Some(lot),
            line: None,
            reason,
            outstanding: Vec::new(),
        }
    }

    pub fn not_expected(lot: LotKey, outstanding: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::RejectedNotExpected,
            lot: Some(lot),
            line: None,
            reason: reason.into(),
            outstanding,
        }
    }

    /// Scan text that does not yield an identifier at all
    pub fn invalid(err: &LotKeyError) -> Self {
        Self {
            outcome: ScanOutcome::RejectedNotExpected,
            lot: None,
            line: None,
            reason: err.to_string(),
            outstanding: Vec::new(),
        }
    }

    pub fn all_consumed(lot: LotKey) -> Self {
        let reason = format!(
            "every pre-filled lot on this transfer has been scanned; {} is not outstanding",
            lot
        );
        Self {
            outcome: ScanOutcome::RejectedAllConsumed,
            lot: Some(lot),
            line: None,
            reason,
            outstanding: Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == ScanOutcome::Accepted
    }
}

/// Combined scan state of one identifier within one transfer.
///
/// Folds the three signals that matter (Ledger membership, persisted consumed
/// quantity, presence on an outstanding pre-fill line) into a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotState {
    /// No line binds the identifier and the session has not accepted it
    Unseen,
    /// Bound on a pre-fill line that still waits for its scan
    Pending { line: LineRef },
    /// Consumed on a persisted line, or accepted earlier in this session
    Accepted { line: Option<LineRef> },
}

impl LotState {
    pub fn is_accepted(&self) -> bool {
        matches!(self, LotState::Accepted { .. })
    }
}

/// Work out the state of `key` from the operation's lines and Ledger membership.
///
/// A line that was packed with zero quantity (moved, not consumed) does not
/// hold the identifier: only consumed quantity does.
pub fn classify(key: &LotKey, lines: &[ExpectedLine], in_ledger: bool) -> LotState {
    if let Some(line) = lines.iter().find(|l| l.binds(key) && l.is_accepted()) {
        return LotState::Accepted {
            line: Some(line.line_ref.clone()),
        };
    }
    if in_ledger {
        return LotState::Accepted { line: None };
    }
    match lines
        .iter()
        .find(|l| l.binds(key) && l.is_prefill() && !l.is_fully_consumed())
    {
        Some(line) => LotState::Pending {
            line: line.line_ref.clone(),
        },
        None => LotState::Unseen,
    }
}

/// Identifier a line gave up by this edit, if any.
///
/// Happens when an accepted line is rebound to another identifier, or its
/// consumed quantity drops to zero (typically packed-but-not-consumed).
pub fn released_key(before: &ExpectedLine, after: &ExpectedLine) -> Option<LotKey> {
    if !before.is_accepted() {
        return None;
    }
    let key = before.lot_key()?;
    if !after.binds(&key) || !after.is_accepted() {
        Some(key)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize;

    fn prefill(lot: &str, consumed: i64) -> ExpectedLine {
        let mut line =
            ExpectedLine::prefill(Uuid::nil(), Uuid::nil(), "Units", lot, Decimal::ONE);
        line.consumed_qty = Decimal::from(consumed);
        line
    }

    #[test]
    fn test_classify_unseen() {
        let key = normalize("LOT9").unwrap();
        assert_eq!(classify(&key, &[prefill("LOT1", 0)], false), LotState::Unseen);
    }

    #[test]
    fn test_classify_pending_on_prefill() {
        let line = prefill("LOT1", 0);
        let key = normalize("lot1").unwrap();
        assert_eq!(
            classify(&key, std::slice::from_ref(&line), false),
            LotState::Pending { line: line.line_ref.clone() }
        );
    }

    #[test]
    fn test_classify_accepted_from_persisted_quantity() {
        let line = prefill("LOT1", 1);
        let key = normalize("LOT1").unwrap();
        let state = classify(&key, std::slice::from_ref(&line), false);
        assert_eq!(state, LotState::Accepted { line: Some(line.line_ref.clone()) });
    }

    #[test]
    fn test_classify_accepted_from_ledger_only() {
        let key = normalize("LOT1").unwrap();
        assert_eq!(
            classify(&key, &[prefill("LOT1", 0)], true),
            LotState::Accepted { line: None }
        );
    }

    #[test]
    fn test_released_key_on_rebind_and_zero_quantity() {
        let before = prefill("LOT1", 1);

        let mut rebound = before.clone();
        rebound.lot_name = Some("LOT2".into());
        assert_eq!(released_key(&before, &rebound), normalize("LOT1").ok());

        let mut packed_empty = before.clone();
        packed_empty.consumed_qty = Decimal::ZERO;
        packed_empty.package_id = Some(Uuid::new_v4());
        assert_eq!(released_key(&before, &packed_empty), normalize("LOT1").ok());

        let mut case_only = before.clone();
        case_only.lot_name = Some(" lot1 ".into());
        assert_eq!(released_key(&before, &case_only), None);
    }

    #[test]
    fn test_released_key_ignores_unaccepted_lines() {
        let before = prefill("LOT1", 0);
        let mut after = before.clone();
        after.lot_name = Some("LOT2".into());
        assert_eq!(released_key(&before, &after), None);
    }
}

//! Expected-set computation over a transfer's lines

use std::collections::{BTreeMap, BTreeSet};

use crate::models::ExpectedLine;
use crate::types::{display_identifier, LotKey};

/// Pre-filled identifiers of one transfer, split by whether they still wait
/// for a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedSet {
    /// Every pre-filled identifier, with the text it was entered as
    prefilled: BTreeMap<LotKey, String>,
    /// Pre-filled identifiers not yet fully consumed
    outstanding: BTreeSet<LotKey>,
}

impl ExpectedSet {
    /// Build the set from the transfer's lines.
    ///
    /// Pre-fill lines contribute their identifier; an identifier bound on any
    /// fully consumed line is not outstanding any more.
    pub fn build(lines: &[ExpectedLine]) -> Self {
        let mut prefilled = BTreeMap::new();
        let mut consumed = BTreeSet::new();

        for line in lines {
            let Some(key) = line.lot_key() else {
                continue;
            };
            if line.is_prefill() {
                prefilled
                    .entry(key.clone())
                    .or_insert_with(|| display_identifier(line.lot_name.as_deref().unwrap_or("")));
            }
            if line.is_fully_consumed() {
                consumed.insert(key);
            }
        }

        let outstanding = prefilled
            .keys()
            .filter(|k| !consumed.contains(*k))
            .cloned()
            .collect();

        Self {
            prefilled,
            outstanding,
        }
    }

    /// No pre-fill at all: scans register new lines instead of validating
    pub fn is_free_registration(&self) -> bool {
        self.prefilled.is_empty()
    }

    pub fn outstanding(&self) -> &BTreeSet<LotKey> {
        &self.outstanding
    }

    pub fn is_outstanding(&self, key: &LotKey) -> bool {
        self.outstanding.contains(key)
    }

    /// Every pre-filled identifier, fully consumed ones included
    pub fn all(&self) -> BTreeSet<LotKey> {
        self.prefilled.keys().cloned().collect()
    }

    pub fn contains(&self, key: &LotKey) -> bool {
        self.prefilled.contains_key(key)
    }

    /// Display text for a pre-filled key
    pub fn display(&self, key: &LotKey) -> Option<&str> {
        self.prefilled.get(key).map(String::as_str)
    }

    /// Outstanding identifiers as entered, sorted for display
    pub fn outstanding_display(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .outstanding
            .iter()
            .filter_map(|k| self.prefilled.get(k).cloned())
            .collect();
        names.sort();
        names
    }
}

/// Convenience wrapper returning only the outstanding keys
pub fn build_expected_set(lines: &[ExpectedLine]) -> BTreeSet<LotKey> {
    ExpectedSet::build(lines).outstanding().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExpectedLine;
    use crate::types::normalize;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn prefill(lot: &str, consumed: i64) -> ExpectedLine {
        let mut line = ExpectedLine::prefill(Uuid::nil(), Uuid::nil(), "Units", lot, Decimal::ONE);
        line.consumed_qty = Decimal::from(consumed);
        line
    }

    fn key(s: &str) -> LotKey {
        normalize(s).unwrap()
    }

    #[test]
    fn test_outstanding_excludes_consumed() {
        let lines = vec![prefill("LOT001", 1), prefill("LOT002", 0)];
        let set = ExpectedSet::build(&lines);

        assert!(!set.is_free_registration());
        assert!(set.is_outstanding(&key("lot002")));
        assert!(!set.is_outstanding(&key("lot001")));
        assert!(set.contains(&key("lot001")));
        assert_eq!(set.all().len(), 2);
    }

    #[test]
    fn test_unbound_lines_do_not_count() {
        let mut unbound = prefill("x", 0);
        unbound.lot_name = None;
        let set = ExpectedSet::build(&[unbound]);
        assert!(set.is_free_registration());
        assert!(set.outstanding().is_empty());
    }

    #[test]
    fn test_scanned_lines_are_not_prefill() {
        let registered =
            ExpectedLine::registered(Uuid::nil(), Uuid::nil(), "Units", "NEWLOT", Decimal::ONE);
        let set = ExpectedSet::build(&[registered]);
        assert!(set.is_free_registration());
    }

    #[test]
    fn test_consumed_anywhere_removes_from_outstanding() {
        // same lot pre-filled twice, one copy consumed
        let lines = vec![prefill("LOT001", 0), prefill("lot001", 1)];
        let set = ExpectedSet::build(&lines);
        assert!(set.outstanding().is_empty());
        assert_eq!(set.all().len(), 1);
    }

    #[test]
    fn test_outstanding_display_sorted_original_text() {
        let lines = vec![prefill("LOT-B", 0), prefill(" LOT-A ", 0), prefill("LOT-C", 1)];
        let set = ExpectedSet::build(&lines);
        assert_eq!(set.outstanding_display(), vec!["LOT-A".to_string(), "LOT-B".to_string()]);
        assert_eq!(build_expected_set(&lines).len(), 2);
    }
}

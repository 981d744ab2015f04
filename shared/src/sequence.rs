//! Scan-order assignment for lines grouped into a package

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ExpectedLine, LineRef};
use crate::types::LotKey;

/// New scan position for one packed line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOrderAssignment {
    pub line: LineRef,
    pub scan_order: i32,
}

/// Compute scan positions for the lines packed into `package_id`.
///
/// Each line's position is `1 + index` of its identifier in the Ledger
/// snapshot. Lines whose identifier is not in the snapshot keep their prior
/// position. Only lines whose position actually changes are returned, so
/// applying the plan twice is a no-op the second time.
pub fn plan_resequence(
    lines: &[ExpectedLine],
    package_id: Uuid,
    snapshot: &[LotKey],
) -> Vec<ScanOrderAssignment> {
    lines
        .iter()
        .filter(|l| l.package_id == Some(package_id))
        .filter_map(|line| {
            let key = line.lot_key()?;
            let index = snapshot.iter().position(|k| *k == key)?;
            let scan_order = i32::try_from(index + 1).ok()?;
            if line.scan_order == Some(scan_order) {
                return None;
            }
            Some(ScanOrderAssignment {
                line: line.line_ref.clone(),
                scan_order,
            })
        })
        .collect()
}

/// Packed lines in listing order: scan position first, unordered lines last
/// by creation time
pub fn package_listing(lines: &[ExpectedLine], package_id: Uuid) -> Vec<&ExpectedLine> {
    let mut packed: Vec<&ExpectedLine> = lines
        .iter()
        .filter(|l| l.package_id == Some(package_id))
        .collect();
    packed.sort_by_key(|l| (l.scan_order.is_none(), l.scan_order, l.created_at));
    packed
}

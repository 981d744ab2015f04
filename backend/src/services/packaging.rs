//! Package grouping resequencer
//!
//! Lines grouped into one physical package get a scan position matching the
//! order their identifiers were scanned, so package listings and labels
//! follow the physical order instead of database insertion order.

use serde::Serialize;
use shared::{package_listing, plan_resequence, ExpectedLine};
use uuid::Uuid;

use super::ledger::{ensure_session, resync_locked};
use super::ScanContext;
use crate::error::AppResult;

/// Package contents after resequencing
#[derive(Debug, Clone, Serialize)]
pub struct PackageSequence {
    pub package_id: Uuid,
    /// Lines in listing order
    pub lines: Vec<ExpectedLine>,
    /// How many lines got a new position
    pub changed: usize,
}

#[derive(Clone)]
pub struct PackagingService {
    ctx: ScanContext,
}

impl PackagingService {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    /// Assign scan positions to every line packed into `package_id`
    pub async fn resequence(&self, operation_id: Uuid, package_id: Uuid) -> AppResult<PackageSequence> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.ctx.load_open(operation_id).await?;
        ensure_session(&self.ctx, operation_id).await?;
        resequence_locked(&self.ctx, operation_id, package_id).await
    }
}

/// Caller holds the operation lock.
pub(crate) async fn resequence_locked(
    ctx: &ScanContext,
    operation_id: Uuid,
    package_id: Uuid,
) -> AppResult<PackageSequence> {
    let mut snapshot = ctx.ledger.snapshot(operation_id).await;
    if snapshot.is_empty() {
        resync_locked(ctx, operation_id).await?;
        snapshot = ctx.ledger.snapshot(operation_id).await;
    }

    let mut lines = ctx.store.load_lines(operation_id).await?;
    let plan = plan_resequence(&lines, package_id, &snapshot);

    if !plan.is_empty() {
        let updates: Vec<ExpectedLine> = plan
            .iter()
            .filter_map(|assignment| {
                let mut line = lines.iter().find(|l| l.line_ref == assignment.line)?.clone();
                line.scan_order = Some(assignment.scan_order);
                Some(line)
            })
            .collect();

        for saved in ctx.store.save_lines(updates).await? {
            if let Some(slot) = lines.iter_mut().find(|l| l.line_ref == saved.line_ref) {
                *slot = saved;
            }
        }

        tracing::info!(
            %operation_id,
            %package_id,
            changed = plan.len(),
            "Package resequenced to scan order"
        );
    }

    let listed = package_listing(&lines, package_id)
        .into_iter()
        .cloned()
        .collect();

    Ok(PackageSequence {
        package_id,
        lines: listed,
        changed: plan.len(),
    })
}

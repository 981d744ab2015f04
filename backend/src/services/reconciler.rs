//! Scan reconciler
//!
//! Entry point for every scan. The decision itself is pure (see
//! `shared::decide`); this service serializes scans per operation, persists
//! the decision and only then records the identifier in the ledger, so a
//! rolled-back write never leaves a ledger entry behind.

use shared::{
    check_unit_quantity, consume_quantities, decide, register_quantities, ExpectedLine, LotKey,
    ReconciliationResult, ScanDecision, ScanEvent,
};
use uuid::Uuid;

use super::ledger::ensure_session;
use super::packaging::resequence_locked;
use super::ScanContext;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ReconcileService {
    ctx: ScanContext,
}

impl ReconcileService {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    /// Reconcile one scan.
    ///
    /// Rejections come back as `Ok` results; `Err` is reserved for policy
    /// violations the operator must fix and for host failures.
    pub async fn reconcile(&self, event: ScanEvent) -> AppResult<ReconciliationResult> {
        let _guard = self.ctx.locks.acquire(event.operation_id).await;
        self.reconcile_locked(&event).await
    }

    /// Reconcile a client's batched save, strictly in order.
    ///
    /// Each scan is its own write: an error stops the batch, scans accepted
    /// before it stay committed.
    pub async fn reconcile_batch(
        &self,
        operation_id: Uuid,
        events: Vec<ScanEvent>,
    ) -> AppResult<Vec<ReconciliationResult>> {
        if let Some(stray) = events.iter().find(|e| e.operation_id != operation_id) {
            return Err(AppError::Validation {
                field: "operation_id".to_string(),
                message: format!(
                    "scan for transfer {} cannot be saved on transfer {}",
                    stray.operation_id, operation_id
                ),
            });
        }

        let _guard = self.ctx.locks.acquire(operation_id).await;
        let mut results = Vec::with_capacity(events.len());
        for event in &events {
            results.push(self.reconcile_locked(event).await?);
        }

        tracing::info!(
            %operation_id,
            scans = results.len(),
            accepted = results.iter().filter(|r| r.is_accepted()).count(),
            "Scan batch reconciled"
        );
        Ok(results)
    }

    async fn reconcile_locked(&self, event: &ScanEvent) -> AppResult<ReconciliationResult> {
        let operation_id = event.operation_id;

        let key = match self.ctx.normalize(&event.raw) {
            Ok(key) => key,
            Err(err) => {
                tracing::info!(%operation_id, outcome = "rejected_not_expected", "Unusable scan: {}", err);
                return Ok(ReconciliationResult::invalid(&err));
            }
        };

        let operation = self.ctx.load_open(operation_id).await?;
        ensure_session(&self.ctx, operation_id).await?;
        let in_ledger = self.ctx.ledger.contains(operation_id, &key).await;

        let result = match decide(event, &key, &operation.lines, in_ledger) {
            ScanDecision::Reject(result) => result,
            ScanDecision::Consume { key, line } => {
                let line = operation
                    .lines
                    .iter()
                    .find(|l| l.line_ref == line)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("Line {}", line)))?;
                self.consume(event, key, line).await?
            }
            ScanDecision::Register {
                key,
                lot_name,
                product_id,
                uom,
            } => {
                let enhanced = self.ctx.store.is_enhanced_verification_enabled(operation_id).await?;
                let quantities = register_quantities(event.quantity, enhanced)?;
                let mut line =
                    ExpectedLine::registered(operation_id, product_id, uom, lot_name, quantities.consumed);
                line.expected_qty = quantities.expected;
                line.package_id = event.package_id;
                self.commit(event, key, line, "new lot registered on this transfer")
                    .await?
            }
            ScanDecision::Reconfirm { key, line } => {
                let enhanced = self.ctx.store.is_enhanced_verification_enabled(operation_id).await?;
                if enhanced {
                    check_unit_quantity(event.quantity)?;
                }
                let line = operation
                    .lines
                    .iter()
                    .find(|l| l.line_ref == line)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("Line {}", line)))?;
                self.ctx.ledger.append(operation_id, key.clone()).await;
                tracing::warn!(%operation_id, lot = %key, "Duplicate scan confirmed by operator override");
                ReconciliationResult::accepted(key, line, "re-scan confirmed by override")
            }
        };

        tracing::info!(
            %operation_id,
            lot = result.lot.as_ref().map(LotKey::as_str).unwrap_or(""),
            outcome = %result.outcome,
            "Scan reconciled"
        );
        Ok(result)
    }

    async fn consume(
        &self,
        event: &ScanEvent,
        key: LotKey,
        mut line: ExpectedLine,
    ) -> AppResult<ReconciliationResult> {
        let enhanced = self
            .ctx
            .store
            .is_enhanced_verification_enabled(event.operation_id)
            .await?;
        let quantities = consume_quantities(&line, event.quantity, enhanced)?;
        line.expected_qty = quantities.expected;
        line.consumed_qty = quantities.consumed;
        if event.package_id.is_some() {
            line.package_id = event.package_id;
        }
        self.commit(event, key, line, "matched a pre-filled lot").await
    }

    /// Persist, then append to the ledger, then order the package if any
    async fn commit(
        &self,
        event: &ScanEvent,
        key: LotKey,
        line: ExpectedLine,
        reason: &str,
    ) -> AppResult<ReconciliationResult> {
        let operation_id = event.operation_id;
        let mut saved = self.ctx.store.save_line(line).await?;
        self.ctx.ledger.append(operation_id, key.clone()).await;

        if let Some(package_id) = saved.package_id {
            let sequence = resequence_locked(&self.ctx, operation_id, package_id).await?;
            if let Some(ordered) = sequence.lines.into_iter().find(|l| l.line_ref == saved.line_ref) {
                saved = ordered;
            }
        }

        Ok(ReconciliationResult::accepted(key, saved, reason))
    }
}

//! Transfer-level validation, finalize and cancel

use serde::Serialize;
use shared::{check_finalize, FinalizeReport, TransferState};
use uuid::Uuid;

use super::ledger::prune_locked;
use super::ScanContext;
use crate::error::AppResult;

/// Result of a successful finalize
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub operation_id: Uuid,
    pub state: TransferState,
    pub report: FinalizeReport,
}

#[derive(Clone)]
pub struct FinalizeService {
    ctx: ScanContext,
}

impl FinalizeService {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    /// Check the accepted identifiers against the pre-filled ones.
    ///
    /// Stale ledger entries are pruned first. Operations without enhanced
    /// verification skip the check.
    pub async fn validate_for_finalize(&self, operation_id: Uuid) -> AppResult<FinalizeReport> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.validate_locked(operation_id).await
    }

    /// Validate, then mark the operation finalized and end its scan session
    pub async fn finalize(&self, operation_id: Uuid) -> AppResult<FinalizeOutcome> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.ctx.load_open(operation_id).await?;

        let report = self.validate_locked(operation_id).await?;
        self.ctx.store.set_state(operation_id, TransferState::Finalized).await?;
        self.close_session(operation_id).await;

        tracing::info!(
            %operation_id,
            expected = report.expected,
            accepted = report.accepted,
            skipped = report.skipped,
            "Transfer finalized"
        );
        Ok(FinalizeOutcome {
            operation_id,
            state: TransferState::Finalized,
            report,
        })
    }

    /// Mark the operation cancelled and end its scan session
    pub async fn cancel(&self, operation_id: Uuid) -> AppResult<TransferState> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.ctx.load_open(operation_id).await?;

        self.ctx.store.set_state(operation_id, TransferState::Cancelled).await?;
        self.close_session(operation_id).await;

        tracing::info!(%operation_id, "Transfer cancelled");
        Ok(TransferState::Cancelled)
    }

    async fn validate_locked(&self, operation_id: Uuid) -> AppResult<FinalizeReport> {
        let operation = self.ctx.store.load_operation(operation_id).await?;
        prune_locked(&self.ctx, operation_id).await?;

        if !self.ctx.store.is_enhanced_verification_enabled(operation_id).await? {
            return Ok(FinalizeReport {
                expected: 0,
                accepted: operation.lines.iter().filter(|l| l.is_accepted()).count(),
                skipped: true,
            });
        }

        let report = check_finalize(&operation.lines).map_err(|err| {
            tracing::info!(%operation_id, "Finalize blocked: {}", err);
            err
        })?;
        Ok(report)
    }

    async fn close_session(&self, operation_id: Uuid) {
        self.ctx.ledger.clear(operation_id).await;
    }
}

//! Line maintenance: pre-fill, host-side edits and deletion
//!
//! Edits keep the ledger consistent with what the lines say: an identifier a
//! line gives up is rolled back, a line the host marks consumed is recorded,
//! and a line moved into a package gets its scan position.

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    check_consumed_update, released_key, ExpectedLine, QuantityPolicyError, DEFAULT_UOM,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{ensure_session, release_key};
use super::packaging::resequence_locked;
use super::ScanContext;
use crate::error::{AppError, AppResult};

/// Manual entry of an expected lot before scanning starts
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PrefillInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub uom: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub lot_name: String,
    pub expected_qty: Option<Decimal>,
}

/// Host-side change to an existing line; absent fields stay as they are
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LinePatch {
    /// Rebind to another identifier
    #[validate(length(min = 1, max = 255))]
    pub lot_name: Option<String>,
    pub consumed_qty: Option<Decimal>,
    /// Move the line into this package
    pub package_id: Option<Uuid>,
    /// Take the line out of its package
    #[serde(default)]
    pub clear_package: bool,
}

#[derive(Clone)]
pub struct LineService {
    ctx: ScanContext,
}

impl LineService {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    pub async fn list_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>> {
        self.ctx.store.load_lines(operation_id).await
    }

    /// Create a pre-fill line bound to a lot not yet on the operation
    pub async fn prefill_line(&self, operation_id: Uuid, input: PrefillInput) -> AppResult<ExpectedLine> {
        input.validate()?;

        let _guard = self.ctx.locks.acquire(operation_id).await;
        let operation = self.ctx.load_open(operation_id).await?;
        let key = self.ctx.normalize(&input.lot_name)?;

        if operation.lines.iter().any(|l| l.binds(&key)) {
            return Err(AppError::DuplicateEntry("lot_name".to_string()));
        }

        let expected_qty = if operation.enhanced_verification {
            match input.expected_qty {
                Some(q) if q != Decimal::ONE => {
                    return Err(QuantityPolicyError::MustBeOne { attempted: q }.into())
                }
                _ => Decimal::ONE,
            }
        } else {
            match input.expected_qty {
                Some(q) if q <= Decimal::ZERO => {
                    return Err(QuantityPolicyError::NotPositive { attempted: q }.into())
                }
                Some(q) => q,
                None => Decimal::ONE,
            }
        };

        let uom = input
            .uom
            .or_else(|| {
                operation
                    .lines
                    .iter()
                    .find(|l| l.product_id == input.product_id)
                    .map(|l| l.uom.clone())
            })
            .unwrap_or_else(|| DEFAULT_UOM.to_string());

        let line = ExpectedLine::prefill(
            operation_id,
            input.product_id,
            uom,
            input.lot_name.trim(),
            expected_qty,
        );
        let saved = self.ctx.store.save_line(line).await?;

        tracing::info!(%operation_id, lot = %key, line = %saved.line_ref, "Pre-fill line created");
        Ok(saved)
    }

    /// Apply a host-side edit, then bring the ledger in line with it
    pub async fn update_line(
        &self,
        operation_id: Uuid,
        line_id: Uuid,
        patch: LinePatch,
    ) -> AppResult<ExpectedLine> {
        patch.validate()?;

        let _guard = self.ctx.locks.acquire(operation_id).await;
        let operation = self.ctx.load_open(operation_id).await?;
        ensure_session(&self.ctx, operation_id).await?;

        let before = operation
            .lines
            .iter()
            .find(|l| l.line_ref.persisted_id() == Some(line_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Line {}", line_id)))?;

        let mut after = before.clone();
        if let Some(lot_name) = &patch.lot_name {
            self.ctx.normalize(lot_name)?;
            after.lot_name = Some(lot_name.trim().to_string());
        }
        if let Some(consumed) = patch.consumed_qty {
            check_consumed_update(consumed, after.expected_qty, operation.enhanced_verification)?;
            // Under the unit policy a consumed line always expects exactly one
            if operation.enhanced_verification && consumed == Decimal::ONE {
                after.expected_qty = Decimal::ONE;
            }
            after.consumed_qty = consumed;
        }
        if patch.clear_package {
            after.package_id = None;
            after.scan_order = None;
        }
        if let Some(package_id) = patch.package_id {
            if after.package_id != Some(package_id) {
                after.scan_order = None;
            }
            after.package_id = Some(package_id);
        }

        if after.is_accepted() {
            if let Some(key) = after.lot_key() {
                let clash = operation.lines.iter().any(|l| {
                    l.line_ref != after.line_ref && l.is_accepted() && l.binds(&key)
                });
                if clash {
                    return Err(AppError::DuplicateEntry("lot_name".to_string()));
                }
            }
        }

        let mut saved = self.ctx.store.save_line(after).await?;

        if let Some(key) = released_key(&before, &saved) {
            release_key(&self.ctx, operation_id, &key).await;
        }
        if saved.is_accepted() {
            if let Some(key) = saved.lot_key() {
                self.ctx.ledger.append(operation_id, key).await;
            }
        }
        if let Some(package_id) = saved.package_id {
            if saved.is_accepted() && before.package_id != saved.package_id {
                let sequence = resequence_locked(&self.ctx, operation_id, package_id).await?;
                if let Some(ordered) = sequence.lines.into_iter().find(|l| l.line_ref == saved.line_ref) {
                    saved = ordered;
                }
            }
        }

        tracing::info!(%operation_id, line = %saved.line_ref, "Line updated");
        Ok(saved)
    }

    /// Delete a line and roll its identifier back out of the ledger
    pub async fn delete_line(&self, operation_id: Uuid, line_id: Uuid) -> AppResult<ExpectedLine> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.ctx.load_open(operation_id).await?;

        let deleted = self.ctx.store.delete_line(operation_id, line_id).await?;
        if deleted.is_accepted() {
            if let Some(key) = deleted.lot_key() {
                release_key(&self.ctx, operation_id, &key).await;
            }
        }

        tracing::info!(%operation_id, line = %deleted.line_ref, "Line deleted");
        Ok(deleted)
    }
}

//! In-memory line store for tests and `storage.backend = memory`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{ExpectedLine, LineRef, TransferOperation, TransferState};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::LineStore;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
struct OperationRecord {
    id: Uuid,
    reference: String,
    enhanced_verification: bool,
    state: TransferState,
    /// Insertion order doubles as the (created_at, id) tie-break
    lines: Vec<ExpectedLine>,
}

impl OperationRecord {
    fn to_operation(&self) -> TransferOperation {
        TransferOperation {
            id: self.id,
            reference: self.reference.clone(),
            enhanced_verification: self.enhanced_verification,
            state: self.state,
            lines: sorted(&self.lines),
        }
    }
}

fn sorted(lines: &[ExpectedLine]) -> Vec<ExpectedLine> {
    let mut lines = lines.to_vec();
    lines.sort_by_key(|l| l.created_at);
    lines
}

/// Line store kept entirely in process memory.
///
/// Applies the same constraints the database schema does: consumed never
/// exceeds expected, and at most one consumed line per identifier.
#[derive(Default)]
pub struct MemoryLineStore {
    operations: RwLock<HashMap<Uuid, OperationRecord>>,
    failing_writes: AtomicUsize,
}

impl MemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` line writes fail as if the host rolled them back
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_line(record: &OperationRecord, line: &ExpectedLine, own_id: Option<Uuid>) -> AppResult<()> {
        if line.consumed_qty < Decimal::ZERO || line.consumed_qty > line.expected_qty {
            return Err(AppError::Validation {
                field: "consumed_qty".to_string(),
                message: format!(
                    "consumed quantity {} must be between 0 and {}",
                    line.consumed_qty, line.expected_qty
                ),
            });
        }
        if !line.is_accepted() {
            return Ok(());
        }
        if let Some(key) = line.lot_key() {
            let clash = record.lines.iter().any(|other| {
                other.line_ref.persisted_id() != own_id && other.is_accepted() && other.binds(&key)
            });
            if clash {
                return Err(AppError::DuplicateEntry("lot".to_string()));
            }
        }
        Ok(())
    }

    fn write_line(record: &mut OperationRecord, mut line: ExpectedLine) -> AppResult<ExpectedLine> {
        match line.line_ref.persisted_id() {
            Some(id) => {
                Self::check_line(record, &line, Some(id))?;
                let slot = record
                    .lines
                    .iter_mut()
                    .find(|l| l.line_ref.persisted_id() == Some(id))
                    .ok_or_else(|| AppError::NotFound(format!("Line {}", id)))?;
                *slot = line.clone();
                Ok(line)
            }
            None => {
                Self::check_line(record, &line, None)?;
                line.line_ref = LineRef::Persisted(Uuid::new_v4());
                record.lines.push(line.clone());
                Ok(line)
            }
        }
    }
}

#[async_trait]
impl LineStore for MemoryLineStore {
    async fn create_operation(
        &self,
        reference: &str,
        enhanced_verification: bool,
    ) -> AppResult<TransferOperation> {
        let record = OperationRecord {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            enhanced_verification,
            state: TransferState::Draft,
            lines: Vec::new(),
        };
        let operation = record.to_operation();
        self.operations.write().await.insert(record.id, record);
        Ok(operation)
    }

    async fn load_operation(&self, operation_id: Uuid) -> AppResult<TransferOperation> {
        self.operations
            .read()
            .await
            .get(&operation_id)
            .map(OperationRecord::to_operation)
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))
    }

    async fn set_state(&self, operation_id: Uuid, state: TransferState) -> AppResult<()> {
        let mut operations = self.operations.write().await;
        let record = operations
            .get_mut(&operation_id)
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))?;
        record.state = state;
        Ok(())
    }

    async fn is_enhanced_verification_enabled(&self, operation_id: Uuid) -> AppResult<bool> {
        self.operations
            .read()
            .await
            .get(&operation_id)
            .map(|r| r.enhanced_verification)
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))
    }

    async fn load_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>> {
        self.operations
            .read()
            .await
            .get(&operation_id)
            .map(|r| sorted(&r.lines))
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))
    }

    async fn save_line(&self, line: ExpectedLine) -> AppResult<ExpectedLine> {
        let mut saved = self.save_lines(vec![line]).await?;
        saved
            .pop()
            .ok_or_else(|| AppError::Internal("line write returned nothing".to_string()))
    }

    async fn save_lines(&self, lines: Vec<ExpectedLine>) -> AppResult<Vec<ExpectedLine>> {
        if self.take_failure() {
            return Err(AppError::StorageError("write rolled back".to_string()));
        }

        let mut operations = self.operations.write().await;
        let Some(first) = lines.first() else {
            return Ok(Vec::new());
        };
        let operation_id = first.operation_id;
        let record = operations
            .get_mut(&operation_id)
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))?;

        // Work on a copy so a failing line leaves nothing behind
        let mut staged = record.clone();
        let mut saved = Vec::with_capacity(lines.len());
        for line in lines {
            if line.operation_id != operation_id {
                return Err(AppError::Validation {
                    field: "operation_id".to_string(),
                    message: "all lines of one write must belong to the same transfer".to_string(),
                });
            }
            saved.push(Self::write_line(&mut staged, line)?);
        }
        *record = staged;
        Ok(saved)
    }

    async fn delete_line(&self, operation_id: Uuid, line_id: Uuid) -> AppResult<ExpectedLine> {
        let mut operations = self.operations.write().await;
        let record = operations
            .get_mut(&operation_id)
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))?;
        let index = record
            .lines
            .iter()
            .position(|l| l.line_ref.persisted_id() == Some(line_id))
            .ok_or_else(|| AppError::NotFound(format!("Line {}", line_id)))?;
        Ok(record.lines.remove(index))
    }

    async fn query_accepted_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>> {
        let lines = self.load_lines(operation_id).await?;
        Ok(lines
            .into_iter()
            .filter(|l| l.is_accepted() && l.lot_key().is_some())
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_persisted_ref() {
        let store = MemoryLineStore::new();
        let op = store.create_operation("WH/IN/00001", true).await.unwrap();
        let line = ExpectedLine::prefill(op.id, Uuid::new_v4(), "Units", "LOT001", Decimal::ONE);

        let saved = store.save_line(line).await.unwrap();
        assert!(saved.line_ref.is_persisted());
        assert_eq!(store.load_lines(op.id).await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn test_second_consumed_line_for_same_lot_is_refused() {
        let store = MemoryLineStore::new();
        let op = store.create_operation("WH/IN/00002", true).await.unwrap();
        let product = Uuid::new_v4();
        store
            .save_line(ExpectedLine::registered(op.id, product, "Units", "LOT001", Decimal::ONE))
            .await
            .unwrap();

        let err = store
            .save_line(ExpectedLine::registered(op.id, product, "Units", " lot001", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntry(_)));
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let store = MemoryLineStore::new();
        let op = store.create_operation("WH/IN/00003", false).await.unwrap();
        store.fail_next_writes(1);

        let line = ExpectedLine::prefill(op.id, Uuid::new_v4(), "Units", "LOT001", Decimal::ONE);
        assert!(store.save_line(line.clone()).await.is_err());
        assert!(store.load_lines(op.id).await.unwrap().is_empty());

        // Only one write was set to fail
        assert!(store.save_line(line).await.is_ok());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryLineStore::new();
        let op = store.create_operation("WH/IN/00004", false).await.unwrap();
        let product = Uuid::new_v4();
        let good = ExpectedLine::prefill(op.id, product, "Units", "A", Decimal::ONE);
        let mut bad = ExpectedLine::prefill(op.id, product, "Units", "B", Decimal::ONE);
        bad.consumed_qty = Decimal::from(2);

        assert!(store.save_lines(vec![good, bad]).await.is_err());
        assert!(store.load_lines(op.id).await.unwrap().is_empty());
    }
}

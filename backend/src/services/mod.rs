//! Scan verification services
//!
//! Every service works on a [`ScanContext`]: the host line store, the
//! session ledger, the per-operation locks and the scanning settings.

use std::sync::Arc;

use shared::{normalize_with_limit, LotKey, LotKeyError, TransferOperation};
use uuid::Uuid;

use crate::config::ScanningConfig;
use crate::error::{AppError, AppResult};
use crate::store::LineStore;

pub mod finalize;
pub mod ledger;
pub mod lines;
pub mod packaging;
pub mod reconciler;

pub use finalize::FinalizeService;
pub use ledger::{LedgerService, OperationGuard, OperationLocks, ScanLedger};
pub use lines::{LinePatch, LineService, PrefillInput};
pub use packaging::{PackageSequence, PackagingService};
pub use reconciler::ReconcileService;

/// Shared handles the scan services operate on
#[derive(Clone)]
pub struct ScanContext {
    pub store: Arc<dyn LineStore>,
    pub ledger: Arc<ScanLedger>,
    pub locks: Arc<OperationLocks>,
    pub scanning: ScanningConfig,
}

impl ScanContext {
    pub fn new(store: Arc<dyn LineStore>, scanning: ScanningConfig) -> Self {
        Self {
            store,
            ledger: Arc::new(ScanLedger::new(scanning.session_idle_timeout())),
            locks: Arc::new(OperationLocks::new()),
            scanning,
        }
    }

    /// Normalize with the configured identifier length limit
    pub fn normalize(&self, raw: &str) -> Result<LotKey, LotKeyError> {
        normalize_with_limit(raw, self.scanning.max_identifier_length)
    }

    /// Load an operation that must still accept changes
    pub(crate) async fn load_open(&self, operation_id: Uuid) -> AppResult<TransferOperation> {
        let operation = self.store.load_operation(operation_id).await?;
        if !operation.is_open() {
            return Err(AppError::OperationClosed {
                id: operation.id,
                state: operation.state.to_string(),
            });
        }
        Ok(operation)
    }
}

//! Host persistence port
//!
//! The scan core never talks to the database directly. Everything it needs
//! from the host (reading lines, transactional line writes, the per-operation
//! verification flag) goes through [`LineStore`].

use async_trait::async_trait;
use shared::{ExpectedLine, TransferOperation, TransferState};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLineStore;
pub use postgres::PgLineStore;

/// Persistence operations consumed by the scan services
#[async_trait]
pub trait LineStore: Send + Sync {
    // ===== Operations =====

    /// Create a draft transfer operation with no lines
    async fn create_operation(
        &self,
        reference: &str,
        enhanced_verification: bool,
    ) -> AppResult<TransferOperation>;

    /// Load an operation with its lines.
    ///
    /// Fails with `NotFound` when the operation does not exist.
    async fn load_operation(&self, operation_id: Uuid) -> AppResult<TransferOperation>;

    /// Move an operation to a new lifecycle state
    async fn set_state(&self, operation_id: Uuid, state: TransferState) -> AppResult<()>;

    /// Operation-type flag for one-identifier-one-unit verification
    async fn is_enhanced_verification_enabled(&self, operation_id: Uuid) -> AppResult<bool>;

    // ===== Lines =====

    /// All lines of an operation, oldest first
    async fn load_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>>;

    /// Create (pending ref) or update (persisted ref) a line in one transaction.
    ///
    /// Returns the line as stored, always with a persisted ref. Nothing is
    /// written when this fails.
    async fn save_line(&self, line: ExpectedLine) -> AppResult<ExpectedLine>;

    /// Save several lines in a single transaction; all or nothing
    async fn save_lines(&self, lines: Vec<ExpectedLine>) -> AppResult<Vec<ExpectedLine>>;

    /// Delete a line and return what was deleted.
    ///
    /// Fails with `NotFound` when the line does not belong to the operation.
    async fn delete_line(&self, operation_id: Uuid, line_id: Uuid) -> AppResult<ExpectedLine>;

    /// Lines with consumed quantity > 0 and a bound identifier, ordered by
    /// (created_at, id)
    async fn query_accepted_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>>;

    // ===== Health =====

    /// Cheap connectivity probe
    async fn ping(&self) -> AppResult<()>;

    /// Short backend name for health output
    fn backend_name(&self) -> &'static str;
}

//! PostgreSQL line store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{ExpectedLine, LineOrigin, LineRef, TransferOperation, TransferState};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::LineStore;
use crate::error::{AppError, AppResult};

const LINE_COLUMNS: &str = "id, operation_id, product_id, uom, expected_qty, consumed_qty, \
     lot_name, origin, package_id, scan_order, created_at";

/// Database row for a transfer operation
#[derive(Debug, sqlx::FromRow)]
struct OperationRow {
    id: Uuid,
    reference: String,
    enhanced_verification: bool,
    state: String,
}

/// Database row for a transfer line
#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    operation_id: Uuid,
    product_id: Uuid,
    uom: String,
    expected_qty: Decimal,
    consumed_qty: Decimal,
    lot_name: Option<String>,
    origin: String,
    package_id: Option<Uuid>,
    scan_order: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LineRow> for ExpectedLine {
    type Error = AppError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let origin = row
            .origin
            .parse::<LineOrigin>()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(ExpectedLine {
            line_ref: LineRef::Persisted(row.id),
            operation_id: row.operation_id,
            product_id: row.product_id,
            uom: row.uom,
            expected_qty: row.expected_qty,
            consumed_qty: row.consumed_qty,
            lot_name: row.lot_name,
            origin,
            package_id: row.package_id,
            scan_order: row.scan_order,
            created_at: row.created_at,
        })
    }
}

fn parse_state(raw: &str) -> AppResult<TransferState> {
    raw.parse::<TransferState>()
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Map a unique violation on the consumed-lot index to a duplicate entry
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::DuplicateEntry("lot".to_string());
        }
        if db_err.is_check_violation() {
            return AppError::Validation {
                field: "consumed_qty".to_string(),
                message: "consumed quantity must be between 0 and the expected quantity"
                    .to_string(),
            };
        }
    }
    AppError::DatabaseError(err)
}

/// Line store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLineStore {
    db: PgPool,
}

impl PgLineStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn write_line(
        tx: &mut Transaction<'_, Postgres>,
        line: ExpectedLine,
    ) -> AppResult<ExpectedLine> {
        let row = match line.line_ref.persisted_id() {
            Some(id) => sqlx::query_as::<_, LineRow>(&format!(
                r#"
                UPDATE transfer_lines
                SET product_id = $1, uom = $2, expected_qty = $3, consumed_qty = $4,
                    lot_name = $5, package_id = $6, scan_order = $7, updated_at = NOW()
                WHERE id = $8 AND operation_id = $9
                RETURNING {}
                "#,
                LINE_COLUMNS
            ))
            .bind(line.product_id)
            .bind(&line.uom)
            .bind(line.expected_qty)
            .bind(line.consumed_qty)
            .bind(&line.lot_name)
            .bind(line.package_id)
            .bind(line.scan_order)
            .bind(id)
            .bind(line.operation_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_write_error)?
            .ok_or_else(|| AppError::NotFound(format!("Line {}", id)))?,
            None => sqlx::query_as::<_, LineRow>(&format!(
                r#"
                INSERT INTO transfer_lines (id, operation_id, product_id, uom, expected_qty,
                    consumed_qty, lot_name, origin, package_id, scan_order, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING {}
                "#,
                LINE_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(line.operation_id)
            .bind(line.product_id)
            .bind(&line.uom)
            .bind(line.expected_qty)
            .bind(line.consumed_qty)
            .bind(&line.lot_name)
            .bind(line.origin.as_str())
            .bind(line.package_id)
            .bind(line.scan_order)
            .bind(line.created_at)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_write_error)?,
        };
        row.try_into()
    }
}

#[async_trait]
impl LineStore for PgLineStore {
    async fn create_operation(
        &self,
        reference: &str,
        enhanced_verification: bool,
    ) -> AppResult<TransferOperation> {
        let row = sqlx::query_as::<_, OperationRow>(
            r#"
            INSERT INTO transfer_operations (id, reference, enhanced_verification, state)
            VALUES ($1, $2, $3, 'draft')
            RETURNING id, reference, enhanced_verification, state
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reference)
        .bind(enhanced_verification)
        .fetch_one(&self.db)
        .await?;

        Ok(TransferOperation {
            id: row.id,
            reference: row.reference,
            enhanced_verification: row.enhanced_verification,
            state: parse_state(&row.state)?,
            lines: Vec::new(),
        })
    }

    async fn load_operation(&self, operation_id: Uuid) -> AppResult<TransferOperation> {
        let row = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT id, reference, enhanced_verification, state
            FROM transfer_operations
            WHERE id = $1
            "#,
        )
        .bind(operation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))?;

        let lines = self.load_lines(operation_id).await?;

        Ok(TransferOperation {
            id: row.id,
            reference: row.reference,
            enhanced_verification: row.enhanced_verification,
            state: parse_state(&row.state)?,
            lines,
        })
    }

    async fn set_state(&self, operation_id: Uuid, state: TransferState) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_operations
            SET state = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(state.as_str())
        .bind(operation_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Transfer {}", operation_id)));
        }
        Ok(())
    }

    async fn is_enhanced_verification_enabled(&self, operation_id: Uuid) -> AppResult<bool> {
        let enabled = sqlx::query_scalar::<_, bool>(
            "SELECT enhanced_verification FROM transfer_operations WHERE id = $1",
        )
        .bind(operation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {}", operation_id)))?;
        Ok(enabled)
    }

    async fn load_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            SELECT {}
            FROM transfer_lines
            WHERE operation_id = $1
            ORDER BY created_at, id
            "#,
            LINE_COLUMNS
        ))
        .bind(operation_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ExpectedLine::try_from).collect()
    }

    async fn save_line(&self, line: ExpectedLine) -> AppResult<ExpectedLine> {
        let mut tx = self.db.begin().await?;
        let saved = Self::write_line(&mut tx, line).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn save_lines(&self, lines: Vec<ExpectedLine>) -> AppResult<Vec<ExpectedLine>> {
        let mut tx = self.db.begin().await?;
        let mut saved = Vec::with_capacity(lines.len());
        for line in lines {
            saved.push(Self::write_line(&mut tx, line).await?);
        }
        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_line(&self, operation_id: Uuid, line_id: Uuid) -> AppResult<ExpectedLine> {
        let row = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            DELETE FROM transfer_lines
            WHERE id = $1 AND operation_id = $2
            RETURNING {}
            "#,
            LINE_COLUMNS
        ))
        .bind(line_id)
        .bind(operation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Line {}", line_id)))?;

        row.try_into()
    }

    async fn query_accepted_lines(&self, operation_id: Uuid) -> AppResult<Vec<ExpectedLine>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            SELECT {}
            FROM transfer_lines
            WHERE operation_id = $1
              AND consumed_qty > 0
              AND lot_name IS NOT NULL
              AND BTRIM(lot_name) <> ''
            ORDER BY created_at, id
            "#,
            LINE_COLUMNS
        ))
        .bind(operation_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ExpectedLine::try_from).collect()
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

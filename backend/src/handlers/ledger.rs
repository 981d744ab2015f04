//! HTTP handlers for the session scan ledger

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use shared::LotKey;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::LedgerService;
use crate::AppState;

#[derive(Serialize)]
pub struct LedgerResponse {
    pub operation_id: Uuid,
    /// Accepted identifiers in scan order
    pub lots: Vec<LotKey>,
}

/// Current ledger snapshot
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<LedgerResponse>> {
    let service = LedgerService::new(state.scan);
    let lots = service.snapshot(operation_id).await?;
    Ok(Json(LedgerResponse { operation_id, lots }))
}

/// Rebuild missing ledger entries from persisted lines
pub async fn resync_ledger(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<LedgerResponse>> {
    let service = LedgerService::new(state.scan);
    let lots = service.resync(operation_id).await?;
    Ok(Json(LedgerResponse { operation_id, lots }))
}

//! HTTP handlers for transfer operations

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{FinalizeReport, TransferOperation, TransferState};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::services::finalize::FinalizeOutcome;
use crate::services::FinalizeService;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferInput {
    #[validate(length(min = 1, max = 64))]
    pub reference: String,
    #[serde(default = "default_enhanced")]
    pub enhanced_verification: bool,
}

fn default_enhanced() -> bool {
    true
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub operation_id: Uuid,
    pub state: TransferState,
}

/// Create a draft transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<(StatusCode, Json<TransferOperation>)> {
    input.validate()?;
    let operation = state
        .scan
        .store
        .create_operation(input.reference.trim(), input.enhanced_verification)
        .await?;
    tracing::info!(operation_id = %operation.id, reference = %operation.reference, "Transfer created");
    Ok((StatusCode::CREATED, Json(operation)))
}

/// Get a transfer with its lines
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<TransferOperation>> {
    let operation = state.scan.store.load_operation(operation_id).await?;
    Ok(Json(operation))
}

/// Run the finalize check without finalizing
pub async fn get_validation(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<FinalizeReport>> {
    let service = FinalizeService::new(state.scan);
    let report = service.validate_for_finalize(operation_id).await?;
    Ok(Json(report))
}

/// Finalize a transfer
pub async fn finalize_transfer(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<FinalizeOutcome>> {
    let service = FinalizeService::new(state.scan);
    let outcome = service.finalize(operation_id).await?;
    Ok(Json(outcome))
}

/// Cancel a transfer
pub async fn cancel_transfer(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<CancelResponse>> {
    let service = FinalizeService::new(state.scan);
    let state = service.cancel(operation_id).await?;
    Ok(Json(CancelResponse { operation_id, state }))
}

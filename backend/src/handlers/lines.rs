//! HTTP handlers for transfer lines

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::ExpectedLine;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::{LinePatch, LineService, PrefillInput};
use crate::AppState;

/// List lines of a transfer
pub async fn list_lines(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> AppResult<Json<Vec<ExpectedLine>>> {
    let service = LineService::new(state.scan);
    let lines = service.list_lines(operation_id).await?;
    Ok(Json(lines))
}

/// Pre-fill an expected lot
pub async fn create_line(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
    Json(input): Json<PrefillInput>,
) -> AppResult<(StatusCode, Json<ExpectedLine>)> {
    let service = LineService::new(state.scan);
    let line = service.prefill_line(operation_id, input).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// Edit a line
pub async fn update_line(
    State(state): State<AppState>,
    Path((operation_id, line_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<LinePatch>,
) -> AppResult<Json<ExpectedLine>> {
    let service = LineService::new(state.scan);
    let line = service.update_line(operation_id, line_id, input).await?;
    Ok(Json(line))
}

/// Delete a line
pub async fn delete_line(
    State(state): State<AppState>,
    Path((operation_id, line_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ExpectedLine>> {
    let service = LineService::new(state.scan);
    let line = service.delete_line(operation_id, line_id).await?;
    Ok(Json(line))
}

//! HTTP handlers for package grouping

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::{PackageSequence, PackagingService};
use crate::AppState;

/// Order a package's lines by scan order
pub async fn resequence_package(
    State(state): State<AppState>,
    Path((operation_id, package_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PackageSequence>> {
    let service = PackagingService::new(state.scan);
    let sequence = service.resequence(operation_id, package_id).await?;
    Ok(Json(sequence))
}

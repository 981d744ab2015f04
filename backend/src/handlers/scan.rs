//! HTTP handlers for scanning

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{ReconciliationResult, ScanEvent};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::services::ReconcileService;
use crate::AppState;

/// One scan as sent by the barcode client
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ScanRequest {
    /// Raw scanned or typed text; normalized server-side
    #[validate(length(max = 4096))]
    pub lot: String,
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub allow_duplicate: bool,
    pub quantity: Option<Decimal>,
    pub package_id: Option<Uuid>,
}

impl ScanRequest {
    fn into_event(self, operation_id: Uuid) -> ScanEvent {
        ScanEvent {
            operation_id,
            raw: self.lot,
            product_hint: self.product_id,
            allow_duplicate: self.allow_duplicate,
            quantity: self.quantity,
            package_id: self.package_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScanBatchRequest {
    #[validate(length(min = 1, max = 500))]
    pub scans: Vec<ScanRequest>,
}

/// Reconcile a single scan
pub async fn scan_lot(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
    Json(input): Json<ScanRequest>,
) -> AppResult<Json<ReconciliationResult>> {
    input.validate()?;
    let service = ReconcileService::new(state.scan);
    let result = service.reconcile(input.into_event(operation_id)).await?;
    Ok(Json(result))
}

/// Reconcile a batch of scans in order
pub async fn scan_batch(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
    Json(input): Json<ScanBatchRequest>,
) -> AppResult<Json<Vec<ReconciliationResult>>> {
    input.validate()?;
    for scan in &input.scans {
        scan.validate()?;
    }
    let events = input
        .scans
        .into_iter()
        .map(|scan| scan.into_event(operation_id))
        .collect();
    let service = ReconcileService::new(state.scan);
    let results = service.reconcile_batch(operation_id, events).await?;
    Ok(Json(results))
}

//! HTTP surface tests, driven through the router without a socket

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use scan_verification::config::{
    DatabaseConfig, LoggingConfig, ScanningConfig, ServerConfig, StorageBackend, StorageConfig,
};
use scan_verification::store::MemoryLineStore;
use scan_verification::{create_app, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
        },
        scanning: ScanningConfig::default(),
        logging: LoggingConfig { json: false },
    };
    create_app(AppState::new(Arc::new(MemoryLineStore::new()), config))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_transfer(app: &Router, lots: &[&str]) -> String {
    let (status, transfer) = call(
        app,
        "POST",
        "/api/v1/transfers",
        Some(json!({ "reference": "WH/IN/00042" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = transfer["id"].as_str().unwrap().to_string();

    for lot in lots {
        let (status, _) = call(
            app,
            "POST",
            &format!("/api/v1/transfers/{}/lines", id),
            Some(json!({
                "product_id": "00000000-0000-0000-0000-000000000042",
                "lot_name": lot,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    id
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["storage_status"], "connected");
}

#[tokio::test]
async fn test_scan_flow() {
    let app = app();
    let id = create_transfer(&app, &["LOT001", "LOT002"]).await;
    let scans = format!("/api/v1/transfers/{}/scans", id);

    let (status, body) = call(&app, "POST", &scans, Some(json!({ "lot": "lot001 " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "accepted");
    assert_eq!(body["lot"], "lot001");

    let (_, body) = call(&app, "POST", &scans, Some(json!({ "lot": "LOT001" }))).await;
    assert_eq!(body["outcome"], "rejected_duplicate");

    let (_, body) = call(&app, "POST", &scans, Some(json!({ "lot": "LOT999" }))).await;
    assert_eq!(body["outcome"], "rejected_not_expected");
    assert_eq!(body["outstanding"], json!(["LOT002"]));

    let (_, body) = call(&app, "GET", &format!("/api/v1/transfers/{}/ledger", id), None).await;
    assert_eq!(body["lots"], json!(["lot001"]));
}

#[tokio::test]
async fn test_batch_scans() {
    let app = app();
    let id = create_transfer(&app, &["A", "B"]).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/transfers/{}/scans/batch", id),
        Some(json!({ "scans": [{ "lot": "A" }, { "lot": "a" }, { "lot": "B" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcomes: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["outcome"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(outcomes, vec!["accepted", "rejected_duplicate", "accepted"]);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let app = app();
    let id = create_transfer(&app, &["A"]).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/transfers/{}/scans/batch", id),
        Some(json!({ "scans": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "scans");
}

#[tokio::test]
async fn test_quantity_policy_error_body() {
    let app = app();
    let id = create_transfer(&app, &["LOT001"]).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/transfers/{}/scans", id),
        Some(json!({ "lot": "LOT001", "quantity": "2.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "QUANTITY_POLICY_VIOLATION");
    assert_eq!(body["error"]["field"], "quantity");
}

#[tokio::test]
async fn test_finalize_reports_missing_lots() {
    let app = app();
    let id = create_transfer(&app, &["LOT001", "LOT002"]).await;
    call(
        &app,
        "POST",
        &format!("/api/v1/transfers/{}/scans", id),
        Some(json!({ "lot": "LOT001" })),
    )
    .await;

    let (status, body) = call(&app, "POST", &format!("/api/v1/transfers/{}/finalize", id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "MISSING_SCANS");
    assert_eq!(body["error"]["details"]["lots"], json!(["LOT002"]));
}

#[tokio::test]
async fn test_duplicate_prefill_is_conflict() {
    let app = app();
    let id = create_transfer(&app, &["LOT001"]).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/transfers/{}/lines", id),
        Some(json!({
            "product_id": "00000000-0000-0000-0000-000000000042",
            "lot_name": " lot001",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_ENTRY");
}

#[tokio::test]
async fn test_unknown_transfer_is_not_found() {
    let app = app();
    let (status, body) = call(
        &app,
        "GET",
        "/api/v1/transfers/00000000-0000-0000-0000-000000000001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

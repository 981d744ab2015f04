//! Lot Scan Verification - Backend
//!
//! Reconciles live barcode scans against the lots pre-filled on a warehouse
//! transfer, keeps the per-transfer scan ledger, orders packed lines by scan
//! order and guards finalize.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::ScanContext;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub scan: ScanContext,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn store::LineStore>, config: Config) -> Self {
        Self {
            scan: ScanContext::new(store, config.scanning.clone()),
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Lot Scan Verification API v1.0"
}

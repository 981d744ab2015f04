//! Route definitions for the lot scan verification API

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Transfer operations
        .nest("/transfers", transfer_routes())
}

/// Transfer routes: scanning, lines, ledger, packages, finalize
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_transfer))
        .route("/:id", get(handlers::get_transfer))
        // Scanning
        .route("/:id/scans", post(handlers::scan_lot))
        .route("/:id/scans/batch", post(handlers::scan_batch))
        // Lines
        .route(
            "/:id/lines",
            get(handlers::list_lines).post(handlers::create_line),
        )
        .route(
            "/:id/lines/:line_id",
            put(handlers::update_line).delete(handlers::delete_line),
        )
        // Session ledger
        .route("/:id/ledger", get(handlers::get_ledger))
        .route("/:id/ledger/resync", post(handlers::resync_ledger))
        // Package grouping
        .route(
            "/:id/packages/:package_id/resequence",
            post(handlers::resequence_package),
        )
        // Finalize
        .route("/:id/validation", get(handlers::get_validation))
        .route("/:id/finalize", post(handlers::finalize_transfer))
        .route("/:id/cancel", post(handlers::cancel_transfer))
}

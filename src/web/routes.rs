use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Question planning: simplify, generate, verify, estimate
            .route("/ask", post(handlers::api::ask))
            // Approved execution: run, insight, chart
            .route("/run", post(handlers::api::run))
            // Whole pipeline in one call, cost gate auto-approved
            .route("/question", post(handlers::api::question))
            // Result export
            .route("/export/chart", post(handlers::api::export_chart))
            .route("/export/csv", post(handlers::api::export_csv))
            // Dataset metadata
            .route("/schema", get(handlers::api::get_schema))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}

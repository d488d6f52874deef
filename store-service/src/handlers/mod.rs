//! HTTP handlers for store-service.

pub mod discount_codes;
pub mod invoices;
pub mod lines;
pub mod stats;

use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "store-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Ready once the entity store answers.
pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::ServiceUnavailable
    })?;

    Ok((StatusCode::OK, Json(json!({ "status": "ready" }))))
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

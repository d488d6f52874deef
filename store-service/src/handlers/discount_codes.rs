//! Discount code lookup and management.

use crate::dtos::CreateDiscountCodeRequest;
use crate::models::{CreateDiscountCode, DiscountCode};
use crate::services::ValidDiscount;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

/// Resolves a code typed at the till. Unknown codes are 404; known codes
/// that cannot be used are 400 with a `reason`.
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ValidDiscount>, AppError> {
    let (_, valid) = state.discounts.find_valid(&code, Utc::now()).await?;
    Ok(Json(valid))
}

pub async fn create_discount_code(
    State(state): State<AppState>,
    Json(payload): Json<CreateDiscountCodeRequest>,
) -> Result<(StatusCode, Json<DiscountCode>), AppError> {
    payload.validate()?;

    tracing::info!(code = %payload.code, percent_off = payload.percent_off, "Creating discount code");

    let input: CreateDiscountCode = payload.into();
    let discount = state.discounts.create(&input).await?;
    Ok((StatusCode::CREATED, Json(discount)))
}

pub async fn delete_discount_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.discounts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

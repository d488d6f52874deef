//! Invoice line handlers. Every mutation recomputes the invoice totals
//! before responding; the response carries only the line itself.

use crate::dtos::{AddLineRequest, UpdateLineRequest};
use crate::models::InvoiceLine;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn list_lines(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Vec<InvoiceLine>>, AppError> {
    let lines = state.invoices.list_lines(&invoice_id).await?;
    Ok(Json(lines))
}

pub async fn add_line(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(payload): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<InvoiceLine>), AppError> {
    payload.validate()?;

    let line = state
        .invoices
        .add_line(
            &invoice_id,
            &payload.product_id,
            payload.quantity,
            payload.unit_price,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn update_line(
    State(state): State<AppState>,
    Path((invoice_id, product_id)): Path<(String, String)>,
    Json(payload): Json<UpdateLineRequest>,
) -> Result<Json<InvoiceLine>, AppError> {
    payload.validate()?;

    let line = state
        .invoices
        .update_line(&invoice_id, &product_id, payload.quantity, payload.unit_price)
        .await?;

    Ok(Json(line))
}

pub async fn remove_line(
    State(state): State<AppState>,
    Path((invoice_id, product_id)): Path<(String, String)>,
) -> Result<Json<InvoiceLine>, AppError> {
    let line = state.invoices.remove_line(&invoice_id, &product_id).await?;
    Ok(Json(line))
}

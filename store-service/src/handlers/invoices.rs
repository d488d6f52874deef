//! Invoice handlers: header management and export.

use crate::dtos::{CreateInvoiceRequest, ExportQuery, InvoiceResponse, UpdateInvoiceRequest};
use crate::models::InvoiceSummary;
use crate::services::{Document, ExportFormat};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    tracing::info!(
        employee_id = %payload.employee_id,
        discount_code = ?payload.discount_code,
        "Creating invoice"
    );

    let today = chrono::Local::now().date_naive();
    let invoice = state
        .invoices
        .create_invoice(payload.into_new_invoice(today), Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    let invoices = state.invoices.list_invoices().await?;
    Ok(Json(invoices))
}

/// `?format=json|excel|pdf`, JSON when omitted.
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = match query.format.as_deref() {
        Some(format) => format.parse::<ExportFormat>()?,
        None => ExportFormat::Json,
    };

    let document = state.exporter.render(&invoice_id, format).await?;
    Ok(document_response(document))
}

pub async fn export_pdf(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Response, AppError> {
    let document = state.exporter.render(&invoice_id, ExportFormat::Pdf).await?;
    Ok(document_response(document))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        invoice_id = %invoice_id,
        discount_code = ?payload.discount_code,
        "Updating invoice"
    );

    let invoice = state
        .invoices
        .update_invoice(&invoice_id, payload.into(), Utc::now())
        .await?;

    Ok(Json(invoice.into()))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.invoices.delete_invoice(&invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn document_response(document: Document) -> Response {
    let content_type = document.content_type();
    match document {
        Document::Json(view) => Json(view).into_response(),
        Document::Excel { filename, bytes } | Document::Pdf { filename, bytes } => (
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            bytes,
        )
            .into_response(),
    }
}

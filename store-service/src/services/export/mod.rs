//! Invoice export: view-model assembly and rendering to JSON, Excel and PDF.
//!
//! Assembly reads the invoice, its lines and every related record while
//! holding the invoice's lock, so a document never mixes totals from one
//! state with lines from another. Rendering runs on the blocking pool and
//! produces the whole document in memory before anything is sent.

pub mod excel;
pub mod pdf;

use crate::error::InvoicingError;
use crate::models::InvoiceLine;
use crate::services::locks::InvoiceLocks;
use crate::services::metrics::EXPORTS_TOTAL;
use crate::services::store::Store;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(InvoicingError::Validation(format!(
                "Unsupported export format '{}'",
                other
            ))),
        }
    }
}

/// Everything a rendered invoice shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub id: String,
    pub date: NaiveDate,
    pub employee_name: String,
    pub customer: Option<CustomerView>,
    pub discount: Option<DiscountView>,
    pub rows: Vec<InvoiceRow>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(rename = "thanhTien", with = "rust_decimal::serde::float")]
    pub payable: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountView {
    pub code: String,
    pub percent_off: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRow {
    /// 1-based, contiguous even when lines are skipped.
    pub seq: usize,
    pub product_id: String,
    pub product_name: String,
    pub unit: Option<String>,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

/// Font files for the PDF renderer. Without them the built-in Helvetica is
/// used and Vietnamese diacritics are folded to plain Latin letters.
#[derive(Debug, Clone, Default)]
pub struct FontSet {
    pub regular: Option<Vec<u8>>,
    pub bold: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub store_name: String,
    pub store_contact: String,
    pub fonts: FontSet,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            store_name: "FMSTYLE".to_string(),
            store_contact: "FMSTYLE Fashion Store".to_string(),
            fonts: FontSet::default(),
        }
    }
}

/// A fully rendered export.
#[derive(Debug, Clone)]
pub enum Document {
    Json(InvoiceView),
    Excel { filename: String, bytes: Vec<u8> },
    Pdf { filename: String, bytes: Vec<u8> },
}

impl Document {
    pub fn content_type(&self) -> &'static str {
        match self {
            Document::Json(_) => "application/json",
            Document::Excel { .. } => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            Document::Pdf { .. } => "application/pdf",
        }
    }
}

#[derive(Clone)]
pub struct InvoiceExporter {
    store: Arc<dyn Store>,
    locks: InvoiceLocks,
    settings: Arc<RenderSettings>,
}

impl InvoiceExporter {
    pub fn new(store: Arc<dyn Store>, locks: InvoiceLocks, settings: RenderSettings) -> Self {
        Self {
            store,
            locks,
            settings: Arc::new(settings),
        }
    }

    /// Builds the view model from one consistent snapshot of the invoice.
    #[instrument(skip(self))]
    pub async fn assemble(&self, invoice_id: &str) -> Result<InvoiceView, InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;

        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::invoice_not_found(invoice_id))?;

        let employee = self
            .store
            .get_employee(&invoice.employee_id)
            .await?
            .ok_or_else(|| {
                InvoicingError::Render(format!(
                    "Invoice {} references missing employee {}",
                    invoice.id, invoice.employee_id
                ))
            })?;

        let customer = match &invoice.customer_id {
            Some(customer_id) => {
                let customer = self.store.get_customer(customer_id).await?.ok_or_else(|| {
                    InvoicingError::Render(format!(
                        "Invoice {} references missing customer {}",
                        invoice.id, customer_id
                    ))
                })?;
                Some(CustomerView {
                    name: customer.name,
                    address: customer.address,
                    phone: customer.phone,
                })
            }
            None => None,
        };

        let discount = match invoice.discount_code_id {
            Some(code_id) => self
                .store
                .get_discount_code(code_id)
                .await?
                .map(|code| DiscountView {
                    code: code.code,
                    percent_off: code.percent_off,
                    description: code.description,
                }),
            None => None,
        };

        let lines = self.store.list_lines(invoice_id).await?;
        let rows = self.build_rows(&lines).await?;

        Ok(InvoiceView {
            payable: invoice.payable(),
            id: invoice.id,
            date: invoice.date,
            employee_name: employee.name,
            customer,
            discount,
            rows,
            subtotal: invoice.subtotal,
            discount_amount: invoice.discount_amount,
        })
    }

    async fn build_rows(&self, lines: &[InvoiceLine]) -> Result<Vec<InvoiceRow>, InvoicingError> {
        let mut rows = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(product) = self.store.get_product(&line.product_id).await? else {
                warn!(
                    invoice_id = %line.invoice_id,
                    product_id = %line.product_id,
                    "Skipping invoice line for missing product"
                );
                continue;
            };
            rows.push(InvoiceRow {
                seq: rows.len() + 1,
                product_id: product.id,
                product_name: product.name,
                unit: product.unit,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
            });
        }
        Ok(rows)
    }

    #[instrument(skip(self), fields(format = format.as_str()))]
    pub async fn render(
        &self,
        invoice_id: &str,
        format: ExportFormat,
    ) -> Result<Document, InvoicingError> {
        let view = self.assemble(invoice_id).await?;

        let document = match format {
            ExportFormat::Json => Document::Json(view),
            ExportFormat::Excel => {
                let filename = format!("Invoice_{}.xlsx", view.id);
                let settings = self.settings.clone();
                let bytes = run_blocking(move || excel::render(&view, &settings)).await?;
                Document::Excel { filename, bytes }
            }
            ExportFormat::Pdf => {
                let filename = format!("Invoice_{}.pdf", view.id);
                let settings = self.settings.clone();
                let bytes = run_blocking(move || pdf::render(&view, &settings)).await?;
                Document::Pdf { filename, bytes }
            }
        };

        EXPORTS_TOTAL.with_label_values(&[format.as_str()]).inc();
        info!(invoice_id = %invoice_id, "Invoice exported");

        Ok(document)
    }
}

async fn run_blocking<F>(render: F) -> Result<Vec<u8>, InvoicingError>
where
    F: FnOnce() -> Result<Vec<u8>, InvoicingError> + Send + 'static,
{
    tokio::task::spawn_blocking(render)
        .await
        .map_err(|e| InvoicingError::Render(format!("Render task failed: {}", e)))?
}

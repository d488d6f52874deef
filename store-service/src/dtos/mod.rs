//! Request and response bodies for the HTTP surface.

use crate::models::{CreateDiscountCode, Invoice, UpdateInvoice};
use crate::services::{InvoiceChanges, NewInvoice};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Pair with `#[serde(default)]`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 20, message = "Invoice id must be 1-20 characters"))]
    pub id: Option<String>,

    #[validate(length(min = 1, message = "Employee is required"))]
    pub employee_id: String,

    pub customer_id: Option<String>,

    /// Defaults to today.
    pub date: Option<NaiveDate>,

    #[validate(length(min = 1, message = "Discount code must not be empty"))]
    pub discount_code: Option<String>,
}

impl CreateInvoiceRequest {
    pub fn into_new_invoice(self, today: NaiveDate) -> NewInvoice {
        NewInvoice {
            id: self.id,
            employee_id: self.employee_id,
            customer_id: self.customer_id,
            date: self.date.unwrap_or(today),
            discount_code: self.discount_code,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, message = "Employee must not be empty"))]
    pub employee_id: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub customer_id: Option<Option<String>>,

    pub date: Option<NaiveDate>,

    /// `null` detaches the current code.
    #[serde(default, deserialize_with = "double_option")]
    pub discount_code: Option<Option<String>>,
}

impl From<UpdateInvoiceRequest> for InvoiceChanges {
    fn from(req: UpdateInvoiceRequest) -> Self {
        InvoiceChanges {
            header: UpdateInvoice {
                employee_id: req.employee_id,
                customer_id: req.customer_id,
                date: req.date,
            },
            discount_code: req.discount_code,
        }
    }
}

/// Invoice with its payable amount.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    #[serde(rename = "thanhTien", with = "rust_decimal::serde::float")]
    pub payable: Decimal,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            payable: invoice.payable(),
            invoice,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    #[validate(length(min = 1, message = "Product is required"))]
    pub product_id: String,

    #[validate(range(min = 0, max = 1000000, message = "Quantity must be between 0 and 1000000"))]
    pub quantity: i32,

    /// Defaults to the product's selling price.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLineRequest {
    #[validate(range(min = 0, max = 1000000, message = "Quantity must be between 0 and 1000000"))]
    pub quantity: Option<i32>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1-50 characters"))]
    pub code: String,

    #[validate(range(min = 0, max = 100, message = "Percent off must be between 0 and 100"))]
    pub percent_off: i32,

    pub description: Option<String>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,

    #[serde(default = "default_active")]
    pub active: bool,

    #[validate(range(min = 0, message = "Usage limit must not be negative"))]
    pub uses_limit: Option<i32>,
}

fn default_active() -> bool {
    true
}

impl From<CreateDiscountCodeRequest> for CreateDiscountCode {
    fn from(req: CreateDiscountCodeRequest) -> Self {
        CreateDiscountCode {
            code: req.code,
            percent_off: req.percent_off,
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
            active: req.active,
            uses_limit: req.uses_limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

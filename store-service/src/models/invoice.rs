//! Invoice model for store-service.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Sales invoice. `subtotal` and `discount_amount` are derived from the
/// invoice lines and are only ever written by the totals engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub employee_id: String,
    pub customer_id: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    pub discount_code_id: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
}

impl Invoice {
    /// Amount owed after discount (thanhTien).
    pub fn payable(&self) -> Decimal {
        self.subtotal - self.discount_amount
    }
}

/// Invoice row for listings, joined with the issuing employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub id: String,
    pub date: NaiveDate,
    pub employee_id: String,
    pub employee_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
}

/// Input for creating an invoice. Totals always start at zero.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub id: String,
    pub employee_id: String,
    pub customer_id: Option<String>,
    pub date: NaiveDate,
    pub discount_code_id: Option<i64>,
}

/// Header fields that may change after creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub employee_id: Option<String>,
    pub customer_id: Option<Option<String>>,
    pub date: Option<NaiveDate>,
}

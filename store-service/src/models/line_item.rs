//! Invoice line model for store-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One product row on an invoice, keyed by `(invoice_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub invoice_id: String,
    pub product_id: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

impl InvoiceLine {
    pub fn new(invoice_id: &str, product_id: &str, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            invoice_id: invoice_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price,
            line_total: crate::money::line_total(quantity, unit_price),
        }
    }
}

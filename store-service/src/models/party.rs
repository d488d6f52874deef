//! Employees, customers and products referenced by invoices.
//!
//! These records are owned by the store's general CRUD surface; this service
//! only reads them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub unit: Option<String>,
    pub supplier_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_price: Decimal,
    pub quantity_on_hand: i32,
}

/// Entity counts for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub customers: i64,
    pub employees: i64,
    pub products: i64,
    pub invoices_this_month: i64,
}

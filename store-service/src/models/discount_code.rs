//! Discount code model for store-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Percentage discount code that can be attached to invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: i64,
    pub code: String,
    pub percent_off: i32,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub uses_so_far: i32,
    pub uses_limit: Option<i32>,
}

/// Input for creating a discount code.
#[derive(Debug, Clone)]
pub struct CreateDiscountCode {
    pub code: String,
    pub percent_off: i32,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub uses_limit: Option<i32>,
}

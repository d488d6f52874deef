//! Entity store interface consumed by the totals engine and the exporter.
//!
//! The store is injected as `Arc<dyn Store>`; [`crate::services::Database`]
//! backs it with PostgreSQL and [`crate::services::MemoryStore`] keeps
//! everything in process for tests and local runs.

use crate::error::InvoicingError;
use crate::models::{
    CreateDiscountCode, CreateInvoice, Customer, DiscountCode, Employee, Invoice, InvoiceLine,
    InvoiceSummary, Product, StoreStats, UpdateInvoice,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub type StoreResult<T> = Result<T, InvoicingError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn health_check(&self) -> StoreResult<()>;

    // Invoices

    async fn create_invoice(&self, input: &CreateInvoice) -> StoreResult<Invoice>;

    async fn get_invoice(&self, invoice_id: &str) -> StoreResult<Option<Invoice>>;

    /// All invoices, newest first, joined with the issuing employee's name.
    async fn list_invoices(&self) -> StoreResult<Vec<InvoiceSummary>>;

    async fn update_invoice(
        &self,
        invoice_id: &str,
        input: &UpdateInvoice,
    ) -> StoreResult<Option<Invoice>>;

    /// Sets or clears the attached discount code. Returns false if the
    /// invoice does not exist.
    async fn set_invoice_discount(
        &self,
        invoice_id: &str,
        discount_code_id: Option<i64>,
    ) -> StoreResult<bool>;

    /// Writes both derived totals in one statement. Returns false if the
    /// invoice does not exist.
    async fn save_invoice_totals(
        &self,
        invoice_id: &str,
        subtotal: Decimal,
        discount_amount: Decimal,
    ) -> StoreResult<bool>;

    /// Deletes the invoice together with its lines.
    async fn delete_invoice(&self, invoice_id: &str) -> StoreResult<bool>;

    // Invoice lines

    /// Lines in insertion order.
    async fn list_lines(&self, invoice_id: &str) -> StoreResult<Vec<InvoiceLine>>;

    async fn get_line(&self, invoice_id: &str, product_id: &str)
        -> StoreResult<Option<InvoiceLine>>;

    /// Fails with `Conflict` if the product is already on the invoice.
    async fn insert_line(&self, line: &InvoiceLine) -> StoreResult<InvoiceLine>;

    async fn update_line(&self, line: &InvoiceLine) -> StoreResult<Option<InvoiceLine>>;

    async fn delete_line(
        &self,
        invoice_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<InvoiceLine>>;

    /// `SUM(line_total)` over the invoice's lines, zero when there are none.
    async fn sum_line_totals(&self, invoice_id: &str) -> StoreResult<Decimal>;

    // Discount codes

    async fn create_discount_code(&self, input: &CreateDiscountCode)
        -> StoreResult<DiscountCode>;

    async fn get_discount_code(&self, id: i64) -> StoreResult<Option<DiscountCode>>;

    /// Exact, case-sensitive match on the code.
    async fn find_discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>>;

    /// Atomically bumps `uses_so_far` by one unless the usage cap is reached.
    /// Returns false when the cap blocked the increment or the code is gone.
    async fn increment_discount_usage(&self, id: i64) -> StoreResult<bool>;

    /// Fails with `Conflict` while an invoice still references the code.
    async fn delete_discount_code(&self, id: i64) -> StoreResult<bool>;

    // Referenced parties

    async fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>>;

    async fn get_customer(&self, customer_id: &str) -> StoreResult<Option<Customer>>;

    async fn get_product(&self, product_id: &str) -> StoreResult<Option<Product>>;

    // Aggregates

    /// Entity counts; invoices are counted for the month containing `today`.
    async fn stats(&self, today: NaiveDate) -> StoreResult<StoreStats>;
}

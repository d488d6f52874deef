//! PostgreSQL-backed entity store for store-service.

use crate::error::InvoicingError;
use crate::models::{
    CreateDiscountCode, CreateInvoice, Customer, DiscountCode, Employee, Invoice, InvoiceLine,
    InvoiceSummary, Product, StoreStats, UpdateInvoice,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{Store, StoreResult};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

const INVOICE_COLUMNS: &str =
    "id, employee_id, customer_id, invoice_date AS date, subtotal, discount_code_id, discount_amount";

const LINE_COLUMNS: &str = "invoice_id, product_id, quantity, unit_price, line_total";

const DISCOUNT_COLUMNS: &str =
    "id, code, percent_off, description, start_date, end_date, active, uses_so_far, uses_limit";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "store-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, InvoicingError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| InvoicingError::store("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), InvoicingError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InvoicingError::store("Migration failed", e))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Maps unique and foreign-key violations to `Conflict`, everything else to
/// `StoreUnavailable`.
fn map_write_error(context: &str, conflict: impl FnOnce() -> String, e: sqlx::Error) -> InvoicingError {
    match e {
        sqlx::Error::Database(ref db_err)
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
        {
            InvoicingError::Conflict(conflict())
        }
        _ => InvoicingError::store(context, e),
    }
}

#[async_trait]
impl Store for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| InvoicingError::store("Health check failed", e))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(invoice_id = %input.id))]
    async fn create_invoice(&self, input: &CreateInvoice) -> StoreResult<Invoice> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (id, employee_id, customer_id, invoice_date, subtotal, discount_code_id, discount_amount)
            VALUES ($1, $2, $3, $4, 0, $5, 0)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(&input.id)
        .bind(&input.employee_id)
        .bind(&input.customer_id)
        .bind(input.date)
        .bind(input.discount_code_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                "Failed to create invoice",
                || format!("Invoice {} already exists", input.id),
                e,
            )
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.id, "Invoice created");

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, invoice_id: &str) -> StoreResult<Option<Invoice>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to get invoice", e))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self) -> StoreResult<Vec<InvoiceSummary>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, InvoiceSummary>(
            r#"
            SELECT i.id, i.invoice_date AS date, i.employee_id, e.name AS employee_name,
                i.subtotal, i.discount_amount
            FROM invoices i
            LEFT JOIN employees e ON e.id = i.employee_id
            ORDER BY i.invoice_date DESC, i.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to list invoices", e))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self, input))]
    async fn update_invoice(
        &self,
        invoice_id: &str,
        input: &UpdateInvoice,
    ) -> StoreResult<Option<Invoice>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET employee_id = COALESCE($2, employee_id),
                customer_id = CASE WHEN $3 THEN $4 ELSE customer_id END,
                invoice_date = COALESCE($5, invoice_date)
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(&input.employee_id)
        .bind(input.customer_id.is_some())
        .bind(input.customer_id.clone().flatten())
        .bind(input.date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to update invoice", e))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn set_invoice_discount(
        &self,
        invoice_id: &str,
        discount_code_id: Option<i64>,
    ) -> StoreResult<bool> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_invoice_discount"])
            .start_timer();

        let result = sqlx::query("UPDATE invoices SET discount_code_id = $2 WHERE id = $1")
            .bind(invoice_id)
            .bind(discount_code_id)
            .execute(&self.pool)
            .await
            .map_err(|e| InvoicingError::store("Failed to set invoice discount", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn save_invoice_totals(
        &self,
        invoice_id: &str,
        subtotal: Decimal,
        discount_amount: Decimal,
    ) -> StoreResult<bool> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_invoice_totals"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE invoices SET subtotal = $2, discount_amount = $3 WHERE id = $1",
        )
        .bind(invoice_id)
        .bind(subtotal)
        .bind(discount_amount)
        .execute(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to save invoice totals", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, invoice_id: &str) -> StoreResult<bool> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        // invoice_lines cascades
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| InvoicingError::store("Failed to delete invoice", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Line Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_lines(&self, invoice_id: &str) -> StoreResult<Vec<InvoiceLine>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_lines"])
            .start_timer();

        let lines = sqlx::query_as::<_, InvoiceLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = $1 ORDER BY line_no"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to list invoice lines", e))?;

        timer.observe_duration();

        Ok(lines)
    }

    #[instrument(skip(self))]
    async fn get_line(
        &self,
        invoice_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<InvoiceLine>> {
        let line = sqlx::query_as::<_, InvoiceLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = $1 AND product_id = $2"
        ))
        .bind(invoice_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to get invoice line", e))?;

        Ok(line)
    }

    #[instrument(skip(self, line), fields(invoice_id = %line.invoice_id, product_id = %line.product_id))]
    async fn insert_line(&self, line: &InvoiceLine) -> StoreResult<InvoiceLine> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_line"])
            .start_timer();

        let inserted = sqlx::query_as::<_, InvoiceLine>(&format!(
            r#"
            INSERT INTO invoice_lines (invoice_id, product_id, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(&line.invoice_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                "Failed to insert invoice line",
                || {
                    format!(
                        "Product {} is already on invoice {}",
                        line.product_id, line.invoice_id
                    )
                },
                e,
            )
        })?;

        timer.observe_duration();

        Ok(inserted)
    }

    #[instrument(skip(self, line), fields(invoice_id = %line.invoice_id, product_id = %line.product_id))]
    async fn update_line(&self, line: &InvoiceLine) -> StoreResult<Option<InvoiceLine>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_line"])
            .start_timer();

        let updated = sqlx::query_as::<_, InvoiceLine>(&format!(
            r#"
            UPDATE invoice_lines
            SET quantity = $3, unit_price = $4, line_total = $5
            WHERE invoice_id = $1 AND product_id = $2
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(&line.invoice_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to update invoice line", e))?;

        timer.observe_duration();

        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_line(
        &self,
        invoice_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<InvoiceLine>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_line"])
            .start_timer();

        let deleted = sqlx::query_as::<_, InvoiceLine>(&format!(
            r#"
            DELETE FROM invoice_lines
            WHERE invoice_id = $1 AND product_id = $2
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to delete invoice line", e))?;

        timer.observe_duration();

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn sum_line_totals(&self, invoice_id: &str) -> StoreResult<Decimal> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_line_totals"])
            .start_timer();

        let subtotal = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(line_total), 0) FROM invoice_lines WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to sum invoice lines", e))?;

        timer.observe_duration();

        Ok(subtotal)
    }

    // -------------------------------------------------------------------------
    // Discount Code Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(code = %input.code))]
    async fn create_discount_code(&self, input: &CreateDiscountCode) -> StoreResult<DiscountCode> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_discount_code"])
            .start_timer();

        let discount = sqlx::query_as::<_, DiscountCode>(&format!(
            r#"
            INSERT INTO discount_codes (code, percent_off, description, start_date, end_date, active, uses_so_far, uses_limit)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            RETURNING {DISCOUNT_COLUMNS}
            "#
        ))
        .bind(&input.code)
        .bind(input.percent_off)
        .bind(&input.description)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.active)
        .bind(input.uses_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                "Failed to create discount code",
                || format!("Discount code '{}' already exists", input.code),
                e,
            )
        })?;

        timer.observe_duration();

        info!(discount_code_id = discount.id, code = %discount.code, "Discount code created");

        Ok(discount)
    }

    #[instrument(skip(self))]
    async fn get_discount_code(&self, id: i64) -> StoreResult<Option<DiscountCode>> {
        let discount = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to get discount code", e))?;

        Ok(discount)
    }

    #[instrument(skip(self))]
    async fn find_discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_discount_code"])
            .start_timer();

        let discount = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to find discount code", e))?;

        timer.observe_duration();

        Ok(discount)
    }

    #[instrument(skip(self))]
    async fn increment_discount_usage(&self, id: i64) -> StoreResult<bool> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["increment_discount_usage"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET uses_so_far = uses_so_far + 1
            WHERE id = $1 AND (uses_limit IS NULL OR uses_so_far < uses_limit)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to increment discount usage", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn delete_discount_code(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM discount_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_write_error(
                    "Failed to delete discount code",
                    || format!("Discount code {} is attached to invoices", id),
                    e,
                )
            })?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Referenced Parties
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>> {
        sqlx::query_as::<_, Employee>(
            "SELECT id, name, address, phone FROM employees WHERE id = $1",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to get employee", e))
    }

    #[instrument(skip(self))]
    async fn get_customer(&self, customer_id: &str) -> StoreResult<Option<Customer>> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, category_id, address, phone FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to get customer", e))
    }

    #[instrument(skip(self))]
    async fn get_product(&self, product_id: &str) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, unit, supplier_id, cost_price, sell_price, quantity_on_hand
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::store("Failed to get product", e))
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn stats(&self, today: NaiveDate) -> StoreResult<StoreStats> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["stats"])
            .start_timer();

        let (month_start, next_month_start) = month_bounds(today);

        let (customers, employees, products, invoices_this_month) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM customers),
                    (SELECT COUNT(*) FROM employees),
                    (SELECT COUNT(*) FROM products),
                    (SELECT COUNT(*) FROM invoices WHERE invoice_date >= $1 AND invoice_date < $2)
                "#,
            )
            .bind(month_start)
            .bind(next_month_start)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| InvoicingError::store("Failed to count entities", e))?;

        timer.observe_duration();

        Ok(StoreStats {
            customers,
            employees,
            products,
            invoices_this_month,
        })
    }
}

/// First day of `today`'s month and first day of the following month.
pub(crate) fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    }
    .unwrap_or(start);
    (start, next)
}

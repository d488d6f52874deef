//! In-process entity store used by tests and by local runs without
//! `DATABASE_URL`.

use crate::error::InvoicingError;
use crate::models::{
    CreateDiscountCode, CreateInvoice, Customer, DiscountCode, Employee, Invoice, InvoiceLine,
    InvoiceSummary, Product, StoreStats, UpdateInvoice,
};
use crate::services::database::month_bounds;
use crate::services::store::{Store, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    employees: BTreeMap<String, Employee>,
    customers: BTreeMap<String, Customer>,
    products: BTreeMap<String, Product>,
    invoices: BTreeMap<String, Invoice>,
    // insertion order per invoice
    lines: BTreeMap<String, Vec<InvoiceLine>>,
    discount_codes: BTreeMap<i64, DiscountCode>,
    next_discount_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_employee(&self, employee: Employee) {
        let mut tables = self.tables.write().await;
        tables.employees.insert(employee.id.clone(), employee);
    }

    pub async fn insert_customer(&self, customer: Customer) {
        let mut tables = self.tables.write().await;
        tables.customers.insert(customer.id.clone(), customer);
    }

    pub async fn insert_product(&self, product: Product) {
        let mut tables = self.tables.write().await;
        tables.products.insert(product.id.clone(), product);
    }

    /// Drops a product without touching the lines that reference it.
    pub async fn remove_product(&self, product_id: &str) -> Option<Product> {
        let mut tables = self.tables.write().await;
        tables.products.remove(product_id)
    }

    pub async fn remove_employee(&self, employee_id: &str) -> Option<Employee> {
        let mut tables = self.tables.write().await;
        tables.employees.remove(employee_id)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_invoice(&self, input: &CreateInvoice) -> StoreResult<Invoice> {
        let mut tables = self.tables.write().await;
        if tables.invoices.contains_key(&input.id) {
            return Err(InvoicingError::Conflict(format!(
                "Invoice {} already exists",
                input.id
            )));
        }

        let invoice = Invoice {
            id: input.id.clone(),
            employee_id: input.employee_id.clone(),
            customer_id: input.customer_id.clone(),
            date: input.date,
            subtotal: Decimal::ZERO,
            discount_code_id: input.discount_code_id,
            discount_amount: Decimal::ZERO,
        };
        tables.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, invoice_id: &str) -> StoreResult<Option<Invoice>> {
        let tables = self.tables.read().await;
        Ok(tables.invoices.get(invoice_id).cloned())
    }

    async fn list_invoices(&self) -> StoreResult<Vec<InvoiceSummary>> {
        let tables = self.tables.read().await;
        let mut summaries: Vec<InvoiceSummary> = tables
            .invoices
            .values()
            .map(|invoice| InvoiceSummary {
                id: invoice.id.clone(),
                date: invoice.date,
                employee_id: invoice.employee_id.clone(),
                employee_name: tables
                    .employees
                    .get(&invoice.employee_id)
                    .map(|e| e.name.clone()),
                subtotal: invoice.subtotal,
                discount_amount: invoice.discount_amount,
            })
            .collect();
        summaries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Ok(summaries)
    }

    async fn update_invoice(
        &self,
        invoice_id: &str,
        input: &UpdateInvoice,
    ) -> StoreResult<Option<Invoice>> {
        let mut tables = self.tables.write().await;
        let Some(invoice) = tables.invoices.get_mut(invoice_id) else {
            return Ok(None);
        };
        if let Some(employee_id) = &input.employee_id {
            invoice.employee_id = employee_id.clone();
        }
        if let Some(customer_id) = &input.customer_id {
            invoice.customer_id = customer_id.clone();
        }
        if let Some(date) = input.date {
            invoice.date = date;
        }
        Ok(Some(invoice.clone()))
    }

    async fn set_invoice_discount(
        &self,
        invoice_id: &str,
        discount_code_id: Option<i64>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.invoices.get_mut(invoice_id) {
            Some(invoice) => {
                invoice.discount_code_id = discount_code_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_invoice_totals(
        &self,
        invoice_id: &str,
        subtotal: Decimal,
        discount_amount: Decimal,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.invoices.get_mut(invoice_id) {
            Some(invoice) => {
                invoice.subtotal = subtotal;
                invoice.discount_amount = discount_amount;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_invoice(&self, invoice_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        tables.lines.remove(invoice_id);
        Ok(tables.invoices.remove(invoice_id).is_some())
    }

    async fn list_lines(&self, invoice_id: &str) -> StoreResult<Vec<InvoiceLine>> {
        let tables = self.tables.read().await;
        Ok(tables.lines.get(invoice_id).cloned().unwrap_or_default())
    }

    async fn get_line(
        &self,
        invoice_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<InvoiceLine>> {
        let tables = self.tables.read().await;
        Ok(tables
            .lines
            .get(invoice_id)
            .and_then(|lines| lines.iter().find(|l| l.product_id == product_id))
            .cloned())
    }

    async fn insert_line(&self, line: &InvoiceLine) -> StoreResult<InvoiceLine> {
        let mut tables = self.tables.write().await;
        if !tables.invoices.contains_key(&line.invoice_id) {
            return Err(InvoicingError::invoice_not_found(&line.invoice_id));
        }
        let lines = tables.lines.entry(line.invoice_id.clone()).or_default();
        if lines.iter().any(|l| l.product_id == line.product_id) {
            return Err(InvoicingError::Conflict(format!(
                "Product {} is already on invoice {}",
                line.product_id, line.invoice_id
            )));
        }
        lines.push(line.clone());
        Ok(line.clone())
    }

    async fn update_line(&self, line: &InvoiceLine) -> StoreResult<Option<InvoiceLine>> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .lines
            .get_mut(&line.invoice_id)
            .and_then(|lines| lines.iter_mut().find(|l| l.product_id == line.product_id));
        match existing {
            Some(existing) => {
                *existing = line.clone();
                Ok(Some(line.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_line(
        &self,
        invoice_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<InvoiceLine>> {
        let mut tables = self.tables.write().await;
        let Some(lines) = tables.lines.get_mut(invoice_id) else {
            return Ok(None);
        };
        let position = lines.iter().position(|l| l.product_id == product_id);
        Ok(position.map(|i| lines.remove(i)))
    }

    async fn sum_line_totals(&self, invoice_id: &str) -> StoreResult<Decimal> {
        let tables = self.tables.read().await;
        let lines = tables.lines.get(invoice_id).map(Vec::as_slice).unwrap_or_default();
        crate::money::checked_sum(lines.iter().map(|l| l.line_total)).ok_or_else(|| {
            InvoicingError::Validation(format!("Invoice {} subtotal is out of range", invoice_id))
        })
    }

    async fn create_discount_code(&self, input: &CreateDiscountCode) -> StoreResult<DiscountCode> {
        let mut tables = self.tables.write().await;
        if tables.discount_codes.values().any(|d| d.code == input.code) {
            return Err(InvoicingError::Conflict(format!(
                "Discount code '{}' already exists",
                input.code
            )));
        }

        tables.next_discount_id += 1;
        let discount = DiscountCode {
            id: tables.next_discount_id,
            code: input.code.clone(),
            percent_off: input.percent_off,
            description: input.description.clone(),
            start_date: input.start_date,
            end_date: input.end_date,
            active: input.active,
            uses_so_far: 0,
            uses_limit: input.uses_limit,
        };
        tables.discount_codes.insert(discount.id, discount.clone());
        Ok(discount)
    }

    async fn get_discount_code(&self, id: i64) -> StoreResult<Option<DiscountCode>> {
        let tables = self.tables.read().await;
        Ok(tables.discount_codes.get(&id).cloned())
    }

    async fn find_discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>> {
        let tables = self.tables.read().await;
        Ok(tables
            .discount_codes
            .values()
            .find(|d| d.code == code)
            .cloned())
    }

    async fn increment_discount_usage(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.discount_codes.get_mut(&id) {
            Some(discount)
                if discount
                    .uses_limit
                    .map_or(true, |limit| discount.uses_so_far < limit) =>
            {
                discount.uses_so_far += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_discount_code(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables
            .invoices
            .values()
            .any(|invoice| invoice.discount_code_id == Some(id))
        {
            return Err(InvoicingError::Conflict(format!(
                "Discount code {} is attached to invoices",
                id
            )));
        }
        Ok(tables.discount_codes.remove(&id).is_some())
    }

    async fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>> {
        let tables = self.tables.read().await;
        Ok(tables.employees.get(employee_id).cloned())
    }

    async fn get_customer(&self, customer_id: &str) -> StoreResult<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables.customers.get(customer_id).cloned())
    }

    async fn get_product(&self, product_id: &str) -> StoreResult<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.get(product_id).cloned())
    }

    async fn stats(&self, today: NaiveDate) -> StoreResult<StoreStats> {
        let tables = self.tables.read().await;
        let (start, next) = month_bounds(today);
        Ok(StoreStats {
            customers: tables.customers.len() as i64,
            employees: tables.employees.len() as i64,
            products: tables.products.len() as i64,
            invoices_this_month: tables
                .invoices
                .values()
                .filter(|invoice| invoice.date >= start && invoice.date < next)
                .count() as i64,
        })
    }
}

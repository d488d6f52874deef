//! Invoice total engine.
//!
//! Owns every write that can change an invoice's derived totals: line
//! mutations, discount attachment and invoice deletion. Each runs under the
//! invoice's lock and ends with a recompute, so `subtotal` and
//! `discount_amount` always reflect the lines that are stored.

use crate::error::{DiscountError, InvoicingError};
use crate::models::{CreateInvoice, Invoice, InvoiceLine, InvoiceSummary, UpdateInvoice};
use crate::money;
use crate::services::discount::DiscountService;
use crate::services::locks::InvoiceLocks;
use crate::services::metrics::{DISCOUNT_ATTACHMENTS_TOTAL, RECOMPUTES_TOTAL};
use crate::services::store::Store;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Invoice header as submitted by a client.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub id: Option<String>,
    pub employee_id: String,
    pub customer_id: Option<String>,
    pub date: NaiveDate,
    pub discount_code: Option<String>,
}

/// Header changes plus an optional discount change. `discount_code` of
/// `Some(None)` detaches the current code.
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub header: UpdateInvoice,
    pub discount_code: Option<Option<String>>,
}

/// A resolved discount request, ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscountChange {
    Unchanged,
    Detach,
    Attach(i64),
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn Store>,
    locks: InvoiceLocks,
    discounts: DiscountService,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn Store>, locks: InvoiceLocks) -> Self {
        let discounts = DiscountService::new(store.clone());
        Self {
            store,
            locks,
            discounts,
        }
    }

    // -------------------------------------------------------------------------
    // Totals
    // -------------------------------------------------------------------------

    /// Recomputes and persists the invoice's totals under its lock.
    pub async fn recompute(&self, invoice_id: &str) -> Result<Invoice, InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;
        self.recompute_locked(invoice_id).await
    }

    /// Caller must hold the invoice's lock.
    #[instrument(skip(self))]
    async fn recompute_locked(&self, invoice_id: &str) -> Result<Invoice, InvoicingError> {
        let invoice = match self.store.get_invoice(invoice_id).await? {
            Some(invoice) => invoice,
            None => {
                RECOMPUTES_TOTAL.with_label_values(&["invoice_missing"]).inc();
                return Err(InvoicingError::invoice_not_found(invoice_id));
            }
        };

        let subtotal = money::round2(self.store.sum_line_totals(invoice_id).await?);

        let discount_amount = match invoice.discount_code_id {
            Some(code_id) => match self.store.get_discount_code(code_id).await? {
                Some(code) => money::discount_amount(subtotal, code.percent_off),
                None => Decimal::ZERO,
            },
            None => Decimal::ZERO,
        };

        if !self
            .store
            .save_invoice_totals(invoice_id, subtotal, discount_amount)
            .await?
        {
            RECOMPUTES_TOTAL.with_label_values(&["invoice_missing"]).inc();
            return Err(InvoicingError::invoice_not_found(invoice_id));
        }

        RECOMPUTES_TOTAL.with_label_values(&["ok"]).inc();

        info!(
            invoice_id = %invoice_id,
            subtotal = %subtotal,
            discount_amount = %discount_amount,
            "Invoice totals recomputed"
        );

        Ok(Invoice {
            subtotal,
            discount_amount,
            ..invoice
        })
    }

    /// Recompute after a line mutation. A vanished invoice is logged and
    /// ignored; the next successful mutation corrects the totals.
    async fn recompute_after_line_change(&self, invoice_id: &str) -> Result<(), InvoicingError> {
        match self.recompute_locked(invoice_id).await {
            Ok(_) => Ok(()),
            Err(InvoicingError::NotFound(msg)) => {
                warn!(invoice_id = %invoice_id, "Skipping recompute: {}", msg);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(employee_id = %input.employee_id))]
    pub async fn create_invoice(
        &self,
        input: NewInvoice,
        as_of: DateTime<Utc>,
    ) -> Result<Invoice, InvoicingError> {
        let id = match input.id {
            Some(id) => id,
            None => generate_invoice_id(),
        };

        self.ensure_employee(&input.employee_id).await?;
        if let Some(customer_id) = &input.customer_id {
            self.ensure_customer(customer_id).await?;
        }

        // Existence is checked under the lock, before any discount use is taken.
        let _guard = self.locks.acquire(&id).await;

        if self.store.get_invoice(&id).await?.is_some() {
            return Err(InvoicingError::Conflict(format!(
                "Invoice {} already exists",
                id
            )));
        }

        let discount_code_id = match &input.discount_code {
            Some(code) => Some(self.consume_discount(code, as_of).await?),
            None => None,
        };

        let invoice = self
            .store
            .create_invoice(&CreateInvoice {
                id,
                employee_id: input.employee_id,
                customer_id: input.customer_id,
                date: input.date,
                discount_code_id,
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            discount_code_id = ?invoice.discount_code_id,
            "Invoice created"
        );

        Ok(invoice)
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, InvoicingError> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::invoice_not_found(invoice_id))
    }

    pub async fn list_invoices(&self) -> Result<Vec<InvoiceSummary>, InvoicingError> {
        self.store.list_invoices().await
    }

    /// Applies header changes and, when requested, a discount change. The
    /// discount is resolved before the header is written, so a rejected
    /// code leaves the invoice untouched. A discount change recomputes
    /// totals before returning.
    #[instrument(skip(self, changes))]
    pub async fn update_invoice(
        &self,
        invoice_id: &str,
        changes: InvoiceChanges,
        as_of: DateTime<Utc>,
    ) -> Result<Invoice, InvoicingError> {
        if let Some(employee_id) = &changes.header.employee_id {
            self.ensure_employee(employee_id).await?;
        }
        if let Some(Some(customer_id)) = &changes.header.customer_id {
            self.ensure_customer(customer_id).await?;
        }

        let _guard = self.locks.acquire(invoice_id).await;

        let current = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::invoice_not_found(invoice_id))?;

        let discount = match &changes.discount_code {
            Some(code) => Some(
                self.resolve_discount(&current, code.as_deref(), as_of)
                    .await?,
            ),
            None => None,
        };

        let mut invoice = self
            .store
            .update_invoice(invoice_id, &changes.header)
            .await?
            .ok_or_else(|| InvoicingError::invoice_not_found(invoice_id))?;

        if let Some(change) = discount {
            self.apply_discount(invoice_id, change).await?;
            invoice = self.recompute_attached(invoice_id).await?;
        }

        Ok(invoice)
    }

    /// Attaches `code` to the invoice, or detaches the current code when
    /// `code` is `None`, then recomputes totals.
    #[instrument(skip(self))]
    pub async fn attach_discount(
        &self,
        invoice_id: &str,
        code: Option<&str>,
        as_of: DateTime<Utc>,
    ) -> Result<Invoice, InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;

        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::invoice_not_found(invoice_id))?;

        let change = self.resolve_discount(&invoice, code, as_of).await?;
        self.apply_discount(invoice_id, change).await?;
        self.recompute_attached(invoice_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: &str) -> Result<(), InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;

        if !self.store.delete_invoice(invoice_id).await? {
            return Err(InvoicingError::invoice_not_found(invoice_id));
        }

        info!(invoice_id = %invoice_id, "Invoice deleted");
        Ok(())
    }

    /// Caller must hold the invoice's lock. Works out what a discount
    /// request means for `invoice` without touching it. Usage is consumed
    /// here, and only when the attached code actually changes.
    async fn resolve_discount(
        &self,
        invoice: &Invoice,
        code: Option<&str>,
        as_of: DateTime<Utc>,
    ) -> Result<DiscountChange, InvoicingError> {
        let Some(code) = code else {
            return Ok(match invoice.discount_code_id {
                Some(_) => DiscountChange::Detach,
                None => DiscountChange::Unchanged,
            });
        };

        if let Some(current_id) = invoice.discount_code_id {
            if let Some(current) = self.store.get_discount_code(current_id).await? {
                if current.code == code {
                    DISCOUNT_ATTACHMENTS_TOTAL
                        .with_label_values(&["unchanged"])
                        .inc();
                    return Ok(DiscountChange::Unchanged);
                }
            }
        }

        let code_id = self.consume_discount(code, as_of).await?;
        Ok(DiscountChange::Attach(code_id))
    }

    /// Caller must hold the invoice's lock.
    async fn apply_discount(
        &self,
        invoice_id: &str,
        change: DiscountChange,
    ) -> Result<(), InvoicingError> {
        match change {
            DiscountChange::Unchanged => {}
            DiscountChange::Detach => {
                self.set_discount(invoice_id, None).await?;
                DISCOUNT_ATTACHMENTS_TOTAL
                    .with_label_values(&["detached"])
                    .inc();
                info!(invoice_id = %invoice_id, "Discount code detached");
            }
            DiscountChange::Attach(code_id) => {
                self.set_discount(invoice_id, Some(code_id)).await?;
                info!(
                    invoice_id = %invoice_id,
                    discount_code_id = code_id,
                    "Discount code attached"
                );
            }
        }
        Ok(())
    }

    /// Validates the code and takes one use of it.
    async fn consume_discount(
        &self,
        code: &str,
        as_of: DateTime<Utc>,
    ) -> Result<i64, InvoicingError> {
        let (_, valid) = match self.discounts.find_valid(code, as_of).await {
            Ok(found) => found,
            Err(e) => {
                DISCOUNT_ATTACHMENTS_TOTAL
                    .with_label_values(&["rejected"])
                    .inc();
                return Err(e);
            }
        };

        // Another invoice may have taken the last use since validation.
        if !self.store.increment_discount_usage(valid.id).await? {
            DISCOUNT_ATTACHMENTS_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            return Err(DiscountError::UsageExhausted(valid.code).into());
        }

        DISCOUNT_ATTACHMENTS_TOTAL
            .with_label_values(&["attached"])
            .inc();
        Ok(valid.id)
    }

    async fn set_discount(
        &self,
        invoice_id: &str,
        discount_code_id: Option<i64>,
    ) -> Result<(), InvoicingError> {
        if !self
            .store
            .set_invoice_discount(invoice_id, discount_code_id)
            .await?
        {
            return Err(InvoicingError::ConflictOrRace(format!(
                "Invoice {} was deleted while its discount was being changed",
                invoice_id
            )));
        }
        Ok(())
    }

    /// Recompute inside a discount change, where the invoice was seen a
    /// moment ago; losing it now is a race.
    async fn recompute_attached(&self, invoice_id: &str) -> Result<Invoice, InvoicingError> {
        self.recompute_locked(invoice_id)
            .await
            .map_err(|e| match e {
                InvoicingError::NotFound(_) => InvoicingError::ConflictOrRace(format!(
                    "Invoice {} vanished during recompute",
                    invoice_id
                )),
                other => other,
            })
    }

    // -------------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------------

    pub async fn list_lines(&self, invoice_id: &str) -> Result<Vec<InvoiceLine>, InvoicingError> {
        self.get_invoice(invoice_id).await?;
        self.store.list_lines(invoice_id).await
    }

    /// Adds a product to the invoice. The unit price defaults to the
    /// product's selling price.
    #[instrument(skip(self))]
    pub async fn add_line(
        &self,
        invoice_id: &str,
        product_id: &str,
        quantity: i32,
        unit_price: Option<Decimal>,
    ) -> Result<InvoiceLine, InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;

        if self.store.get_invoice(invoice_id).await?.is_none() {
            return Err(InvoicingError::invoice_not_found(invoice_id));
        }
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| InvoicingError::NotFound(format!("Product {} not found", product_id)))?;

        let unit_price = unit_price.unwrap_or(product.sell_price);
        let line_total = validate_line(quantity, unit_price)?;
        self.ensure_subtotal_fits(invoice_id, Decimal::ZERO, line_total)
            .await?;

        let line = self
            .store
            .insert_line(&InvoiceLine::new(invoice_id, product_id, quantity, unit_price))
            .await?;

        self.recompute_after_line_change(invoice_id).await?;

        info!(
            invoice_id = %invoice_id,
            product_id = %product_id,
            quantity = quantity,
            line_total = %line.line_total,
            "Invoice line added"
        );

        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn update_line(
        &self,
        invoice_id: &str,
        product_id: &str,
        quantity: Option<i32>,
        unit_price: Option<Decimal>,
    ) -> Result<InvoiceLine, InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;

        let existing = self
            .store
            .get_line(invoice_id, product_id)
            .await?
            .ok_or_else(|| line_not_found(invoice_id, product_id))?;

        let quantity = quantity.unwrap_or(existing.quantity);
        let unit_price = unit_price.unwrap_or(existing.unit_price);
        let line_total = validate_line(quantity, unit_price)?;
        self.ensure_subtotal_fits(invoice_id, existing.line_total, line_total)
            .await?;

        let line = InvoiceLine::new(invoice_id, product_id, quantity, unit_price);
        let line = self
            .store
            .update_line(&line)
            .await?
            .ok_or_else(|| line_not_found(invoice_id, product_id))?;

        self.recompute_after_line_change(invoice_id).await?;

        info!(
            invoice_id = %invoice_id,
            product_id = %product_id,
            line_total = %line.line_total,
            "Invoice line updated"
        );

        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn remove_line(
        &self,
        invoice_id: &str,
        product_id: &str,
    ) -> Result<InvoiceLine, InvoicingError> {
        let _guard = self.locks.acquire(invoice_id).await;

        let line = self
            .store
            .delete_line(invoice_id, product_id)
            .await?
            .ok_or_else(|| line_not_found(invoice_id, product_id))?;

        self.recompute_after_line_change(invoice_id).await?;

        info!(invoice_id = %invoice_id, product_id = %product_id, "Invoice line removed");

        Ok(line)
    }

    async fn ensure_employee(&self, employee_id: &str) -> Result<(), InvoicingError> {
        match self.store.get_employee(employee_id).await? {
            Some(_) => Ok(()),
            None => Err(InvoicingError::NotFound(format!(
                "Employee {} not found",
                employee_id
            ))),
        }
    }

    /// Caller must hold the invoice's lock. Refuses a line change whose
    /// resulting subtotal would not fit the stored amount columns.
    async fn ensure_subtotal_fits(
        &self,
        invoice_id: &str,
        replaced: Decimal,
        added: Decimal,
    ) -> Result<(), InvoicingError> {
        let current = self.store.sum_line_totals(invoice_id).await?;
        money::checked_sum([current - replaced, added])
            .map(|_| ())
            .ok_or_else(|| {
                InvoicingError::Validation(format!(
                    "invoice subtotal must not exceed {}",
                    money::MAX_AMOUNT
                ))
            })
    }

    async fn ensure_customer(&self, customer_id: &str) -> Result<(), InvoicingError> {
        match self.store.get_customer(customer_id).await? {
            Some(_) => Ok(()),
            None => Err(InvoicingError::NotFound(format!(
                "Customer {} not found",
                customer_id
            ))),
        }
    }
}

/// Checks a line before it is written and returns its total.
fn validate_line(quantity: i32, unit_price: Decimal) -> Result<Decimal, InvoicingError> {
    if quantity < 0 {
        return Err(InvoicingError::Validation(
            "quantity must not be negative".to_string(),
        ));
    }
    if unit_price.is_sign_negative() && !unit_price.is_zero() {
        return Err(InvoicingError::Validation(
            "unitPrice must not be negative".to_string(),
        ));
    }
    if unit_price.normalize().scale() > 2 {
        return Err(InvoicingError::Validation(
            "unitPrice must have at most two decimal places".to_string(),
        ));
    }
    if unit_price > money::MAX_AMOUNT {
        return Err(InvoicingError::Validation(format!(
            "unitPrice must not exceed {}",
            money::MAX_AMOUNT
        )));
    }
    money::checked_line_total(quantity, unit_price).ok_or_else(|| {
        InvoicingError::Validation(format!(
            "line total must not exceed {}",
            money::MAX_AMOUNT
        ))
    })
}

fn line_not_found(invoice_id: &str, product_id: &str) -> InvoicingError {
    InvoicingError::NotFound(format!(
        "Product {} is not on invoice {}",
        product_id, invoice_id
    ))
}

/// `HD` followed by eight upper-case hex digits.
pub fn generate_invoice_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("HD{}", hex[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateDiscountCode, Employee, Product};
    use crate::services::memory::MemoryStore;
    use rust_decimal_macros::dec;

    async fn service() -> (InvoiceService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_employee(Employee {
                id: "NV01".into(),
                name: "Nguyen Van A".into(),
                address: None,
                phone: None,
            })
            .await;
        for (id, price) in [("HH01", dec!(250000)), ("HH02", dec!(350000))] {
            store
                .insert_product(Product {
                    id: id.into(),
                    name: format!("Product {}", id),
                    unit: Some("cai".into()),
                    supplier_id: "NCC01".into(),
                    cost_price: price / dec!(2),
                    sell_price: price,
                    quantity_on_hand: 100,
                })
                .await;
        }
        let dyn_store: Arc<dyn Store> = store.clone();
        (InvoiceService::new(dyn_store, InvoiceLocks::new()), store)
    }

    fn new_invoice(id: &str) -> NewInvoice {
        NewInvoice {
            id: Some(id.to_string()),
            employee_id: "NV01".to_string(),
            customer_id: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            discount_code: None,
        }
    }

    #[test]
    fn generated_ids_are_prefixed_hex() {
        let id = generate_invoice_id();
        assert_eq!(id.len(), 10);
        assert!(id.starts_with("HD"));
        assert!(id[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[tokio::test]
    async fn line_price_defaults_to_sell_price() {
        let (service, _) = service().await;
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();

        let line = service.add_line("HD01", "HH02", 2, None).await.unwrap();
        assert_eq!(line.unit_price, dec!(350000));
        assert_eq!(line.line_total, dec!(700000));
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let (service, _) = service().await;
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();
        service
            .add_line("HD01", "HH01", 2, Some(dec!(250000)))
            .await
            .unwrap();

        let first = service.recompute("HD01").await.unwrap();
        let second = service.recompute("HD01").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.subtotal, dec!(500000));
    }

    #[tokio::test]
    async fn negative_quantity_is_rejected_before_any_write() {
        let (service, store) = service().await;
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();

        let err = service.add_line("HD01", "HH01", -1, None).await.unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));
        assert!(store.list_lines("HD01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn switching_codes_consumes_only_the_new_one() {
        let (service, store) = service().await;
        let mut ids = Vec::new();
        for code in ["A10", "B20"] {
            let created = store
                .create_discount_code(&CreateDiscountCode {
                    code: code.into(),
                    percent_off: 10,
                    description: None,
                    start_date: None,
                    end_date: None,
                    active: true,
                    uses_limit: None,
                })
                .await
                .unwrap();
            ids.push(created.id);
        }
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();

        service
            .attach_discount("HD01", Some("A10"), Utc::now())
            .await
            .unwrap();
        service
            .attach_discount("HD01", Some("B20"), Utc::now())
            .await
            .unwrap();

        let a = store.get_discount_code(ids[0]).await.unwrap().unwrap();
        let b = store.get_discount_code(ids[1]).await.unwrap().unwrap();
        assert_eq!(a.uses_so_far, 1);
        assert_eq!(b.uses_so_far, 1);
    }

    #[tokio::test]
    async fn detaching_clears_the_discount() {
        let (service, store) = service().await;
        store
            .create_discount_code(&CreateDiscountCode {
                code: "SALE10".into(),
                percent_off: 10,
                description: None,
                start_date: None,
                end_date: None,
                active: true,
                uses_limit: None,
            })
            .await
            .unwrap();
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();
        service
            .add_line("HD01", "HH02", 1, None)
            .await
            .unwrap();

        let attached = service
            .attach_discount("HD01", Some("SALE10"), Utc::now())
            .await
            .unwrap();
        assert_eq!(attached.discount_amount, dec!(35000));

        let detached = service
            .attach_discount("HD01", None, Utc::now())
            .await
            .unwrap();
        assert_eq!(detached.discount_code_id, None);
        assert_eq!(detached.discount_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn rejected_code_leaves_the_header_untouched() {
        let (service, store) = service().await;
        store
            .create_discount_code(&CreateDiscountCode {
                code: "OFF".into(),
                percent_off: 10,
                description: None,
                start_date: None,
                end_date: None,
                active: false,
                uses_limit: None,
            })
            .await
            .unwrap();
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();

        let changes = InvoiceChanges {
            header: UpdateInvoice {
                date: NaiveDate::from_ymd_opt(2030, 1, 1),
                ..Default::default()
            },
            discount_code: Some(Some("OFF".into())),
        };
        let err = service
            .update_invoice("HD01", changes, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Discount(DiscountError::Inactive(_))));

        let invoice = service.get_invoice("HD01").await.unwrap();
        assert_eq!(invoice.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(invoice.discount_code_id, None);
    }

    #[tokio::test]
    async fn sub_cent_prices_are_rejected() {
        let (service, store) = service().await;
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();

        let err = service
            .add_line("HD01", "HH01", 3, Some(dec!(0.005)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));
        assert!(store.list_lines("HD01").await.unwrap().is_empty());

        // Trailing zeros are not extra precision
        let line = service
            .add_line("HD01", "HH01", 3, Some(dec!(19.990)))
            .await
            .unwrap();
        assert_eq!(line.line_total, dec!(59.97));
    }

    #[tokio::test]
    async fn oversized_amounts_are_rejected_without_panicking() {
        let (service, store) = service().await;
        service
            .create_invoice(new_invoice("HD01"), Utc::now())
            .await
            .unwrap();

        let err = service
            .add_line("HD01", "HH01", 100, Some(dec!(10000000000000000000000000000)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));

        service
            .add_line("HD01", "HH01", 1, Some(dec!(600000000000)))
            .await
            .unwrap();
        let err = service
            .add_line("HD01", "HH02", 1, Some(dec!(600000000000)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));

        let err = service
            .update_line("HD01", "HH01", Some(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));

        let invoice = service.get_invoice("HD01").await.unwrap();
        assert_eq!(invoice.subtotal, dec!(600000000000));
        assert_eq!(store.list_lines("HD01").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_creates_with_one_id_consume_one_use() {
        let (service, store) = service().await;
        store
            .create_discount_code(&CreateDiscountCode {
                code: "RACE".into(),
                percent_off: 5,
                description: None,
                start_date: None,
                end_date: None,
                active: true,
                uses_limit: None,
            })
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let mut input = new_invoice("HD950");
                input.discount_code = Some("RACE".into());
                service.create_invoice(input, Utc::now()).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(InvoicingError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(created, 1);
        let code = store.find_discount_code("RACE").await.unwrap().unwrap();
        assert_eq!(code.uses_so_far, 1);
    }
}

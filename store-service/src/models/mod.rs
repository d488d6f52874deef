//! Domain models for store-service.

mod discount_code;
mod invoice;
mod line_item;
mod party;

pub use discount_code::{CreateDiscountCode, DiscountCode};
pub use invoice::{CreateInvoice, Invoice, InvoiceSummary, UpdateInvoice};
pub use line_item::InvoiceLine;
pub use party::{Customer, Employee, Product, StoreStats};

//! Services module for store-service.

pub mod database;
pub mod discount;
pub mod export;
pub mod invoicing;
pub mod locks;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use discount::{DiscountService, ValidDiscount};
pub use export::{Document, ExportFormat, FontSet, InvoiceExporter, InvoiceView, RenderSettings};
pub use invoicing::{InvoiceChanges, InvoiceService, NewInvoice};
pub use locks::InvoiceLocks;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{Store, StoreResult};

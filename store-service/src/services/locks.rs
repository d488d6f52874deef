//! Per-invoice mutual exclusion.
//!
//! Every mutation of an invoice's lines, its discount attachment and its
//! stored totals runs while holding that invoice's lock, so the
//! read-sum-write in the totals engine never interleaves with another
//! writer. Different invoices never block each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct InvoiceLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Held for the duration of one invoice mutation. Dropping it releases the
/// lock and prunes the registry entry once nobody else is waiting on it.
pub struct InvoiceGuard {
    registry: Arc<DashMap<String, Arc<Mutex<()>>>>,
    invoice_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InvoiceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, invoice_id: &str) -> InvoiceGuard {
        let mutex = self
            .locks
            .entry(invoice_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        InvoiceGuard {
            registry: self.locks.clone(),
            invoice_id: invoice_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of invoices with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for InvoiceGuard {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the registry's
        // copy plus any waiters.
        self.guard.take();
        self.registry
            .remove_if(&self.invoice_id, |_, mutex| Arc::strong_count(mutex) <= 1);
    }
}

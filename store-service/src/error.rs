//! Domain errors for store-service and their HTTP mapping.

use service_core::error::AppError;
use thiserror::Error;

/// Why a discount code cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    #[error("Discount code '{0}' not found")]
    NotFound(String),

    #[error("Discount code '{0}' is inactive")]
    Inactive(String),

    #[error("Discount code '{0}' is not valid yet")]
    NotYetStarted(String),

    #[error("Discount code '{0}' has expired")]
    Expired(String),

    #[error("Discount code '{0}' has reached its usage limit")]
    UsageExhausted(String),
}

impl DiscountError {
    pub fn reason(&self) -> &'static str {
        match self {
            DiscountError::NotFound(_) => "not_found",
            DiscountError::Inactive(_) => "inactive",
            DiscountError::NotYetStarted(_) => "not_yet_started",
            DiscountError::Expired(_) => "expired",
            DiscountError::UsageExhausted(_) => "usage_exhausted",
        }
    }
}

#[derive(Debug, Error)]
pub enum InvoicingError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Discount(#[from] DiscountError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ConflictOrRace(String),

    #[error("{0}")]
    Render(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl InvoicingError {
    pub fn invoice_not_found(invoice_id: &str) -> Self {
        InvoicingError::NotFound(format!("Invoice {} not found", invoice_id))
    }

    pub fn store(context: &str, err: impl std::fmt::Display) -> Self {
        InvoicingError::StoreUnavailable(anyhow::anyhow!("{}: {}", context, err))
    }

    /// Label used by the error counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            InvoicingError::NotFound(_) => "not_found",
            InvoicingError::Validation(_) => "validation",
            InvoicingError::Discount(_) => "discount_invalid",
            InvoicingError::Conflict(_) => "conflict",
            InvoicingError::ConflictOrRace(_) => "conflict_or_race",
            InvoicingError::Render(_) => "render",
            InvoicingError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<sqlx::Error> for InvoicingError {
    fn from(err: sqlx::Error) -> Self {
        InvoicingError::StoreUnavailable(anyhow::Error::new(err))
    }
}

impl From<InvoicingError> for AppError {
    fn from(err: InvoicingError) -> Self {
        crate::services::metrics::ERRORS_TOTAL
            .with_label_values(&[err.metric_label()])
            .inc();

        match err {
            InvoicingError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            InvoicingError::Validation(msg) => AppError::InvalidInput(anyhow::anyhow!(msg)),
            InvoicingError::Discount(DiscountError::NotFound(code)) => AppError::NotFound(
                anyhow::anyhow!("{}", DiscountError::NotFound(code)),
            ),
            InvoicingError::Discount(discount) => AppError::DiscountInvalid {
                reason: discount.reason(),
                message: discount.to_string(),
            },
            InvoicingError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            InvoicingError::ConflictOrRace(msg) => AppError::ConflictOrRace(anyhow::anyhow!(msg)),
            InvoicingError::Render(msg) => AppError::RenderError(anyhow::anyhow!(msg)),
            InvoicingError::StoreUnavailable(err) => AppError::DatabaseError(err),
        }
    }
}

//! Discount code validation.
//!
//! [`validate`] is a pure check of one record at one instant. Attaching a
//! code to an invoice, and the usage increment that goes with it, lives in
//! the totals engine.

use crate::error::{DiscountError, InvoicingError};
use crate::models::{CreateDiscountCode, DiscountCode};
use crate::services::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// A code that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidDiscount {
    pub id: i64,
    pub code: String,
    pub percent_off: i32,
}

/// Checks, in order: active flag, start date, end date, usage cap.
pub fn validate(record: &DiscountCode, as_of: DateTime<Utc>) -> Result<ValidDiscount, DiscountError> {
    if !record.active {
        return Err(DiscountError::Inactive(record.code.clone()));
    }
    if record.start_date.is_some_and(|start| as_of < start) {
        return Err(DiscountError::NotYetStarted(record.code.clone()));
    }
    if record.end_date.is_some_and(|end| as_of > end) {
        return Err(DiscountError::Expired(record.code.clone()));
    }
    if record
        .uses_limit
        .is_some_and(|limit| record.uses_so_far >= limit)
    {
        return Err(DiscountError::UsageExhausted(record.code.clone()));
    }

    Ok(ValidDiscount {
        id: record.id,
        code: record.code.clone(),
        percent_off: record.percent_off,
    })
}

#[derive(Clone)]
pub struct DiscountService {
    store: Arc<dyn Store>,
}

impl DiscountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Looks a code up by its exact text and validates it at `as_of`.
    #[instrument(skip(self))]
    pub async fn find_valid(
        &self,
        code: &str,
        as_of: DateTime<Utc>,
    ) -> Result<(DiscountCode, ValidDiscount), InvoicingError> {
        let record = self
            .store
            .find_discount_code(code)
            .await?
            .ok_or_else(|| DiscountError::NotFound(code.to_string()))?;
        let valid = validate(&record, as_of)?;
        Ok((record, valid))
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: &CreateDiscountCode) -> Result<DiscountCode, InvoicingError> {
        if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
            if end < start {
                return Err(InvoicingError::Validation(
                    "endDate must not be before startDate".to_string(),
                ));
            }
        }
        self.store.create_discount_code(input).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), InvoicingError> {
        if !self.store.delete_discount_code(id).await? {
            return Err(InvoicingError::NotFound(format!(
                "Discount code {} not found",
                id
            )));
        }
        info!(discount_code_id = id, "Discount code deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record() -> DiscountCode {
        DiscountCode {
            id: 7,
            code: "SALE10".to_string(),
            percent_off: 10,
            description: Some("Summer sale".to_string()),
            start_date: None,
            end_date: None,
            active: true,
            uses_so_far: 0,
            uses_limit: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn unrestricted_active_code_is_valid() {
        let valid = validate(&record(), now()).unwrap();
        assert_eq!(valid.id, 7);
        assert_eq!(valid.percent_off, 10);
    }

    #[test]
    fn inactive_code_is_rejected() {
        let mut code = record();
        code.active = false;
        assert_eq!(
            validate(&code, now()),
            Err(DiscountError::Inactive("SALE10".into()))
        );
    }

    #[test]
    fn future_start_is_not_yet_started() {
        let mut code = record();
        code.start_date = Some(now() + Duration::days(1));
        assert_eq!(
            validate(&code, now()),
            Err(DiscountError::NotYetStarted("SALE10".into()))
        );
    }

    #[test]
    fn past_end_is_expired() {
        let mut code = record();
        code.end_date = Some(now() - Duration::seconds(1));
        assert_eq!(
            validate(&code, now()),
            Err(DiscountError::Expired("SALE10".into()))
        );
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut code = record();
        code.start_date = Some(now());
        code.end_date = Some(now());
        assert!(validate(&code, now()).is_ok());
    }

    #[test]
    fn reaching_the_limit_exhausts_the_code() {
        let mut code = record();
        code.uses_limit = Some(3);
        code.uses_so_far = 3;
        assert_eq!(
            validate(&code, now()),
            Err(DiscountError::UsageExhausted("SALE10".into()))
        );

        code.uses_so_far = 2;
        assert!(validate(&code, now()).is_ok());
    }

    #[test]
    fn inactive_wins_over_every_other_failure() {
        let mut code = record();
        code.active = false;
        code.end_date = Some(now() - Duration::days(1));
        code.uses_limit = Some(0);
        assert!(matches!(
            validate(&code, now()),
            Err(DiscountError::Inactive(_))
        ));
    }
}

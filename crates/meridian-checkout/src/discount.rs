//! # Discount Engine
//!
//! Validates a code against the discount authority.
//!
//! ```text
//! apply(" save5 ", subtotal_base)
//!    │
//!    ├── normalize → "SAVE5"  (invalid shape → ValidationError, no request)
//!    │
//!    ├── POST discounts/validate { code, subtotalBase }
//!    │
//!    ├── isValid  → DiscountCode { calculated_amount_base: authority amount }
//!    └── !isValid → DiscountRejected { reason, authority message verbatim }
//! ```
//!
//! The engine holds no state. The applied code lives in the
//! [`CartStore`](crate::store::CartStore), which keeps at most one and only
//! replaces it on success.

use meridian_core::validation::normalize_discount_code;
use meridian_core::{DiscountCode, Money};
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{CheckoutBackend, DiscountRequest};
use crate::error::{BackendError, CheckoutError, CheckoutResult, DiscountRejection};

pub struct DiscountEngine {
    backend: Arc<dyn CheckoutBackend>,
}

impl DiscountEngine {
    pub fn new(backend: Arc<dyn CheckoutBackend>) -> Self {
        DiscountEngine { backend }
    }

    /// Validates `code` against a base-currency subtotal.
    pub async fn apply(&self, code: &str, subtotal_base: &Money) -> CheckoutResult<DiscountCode> {
        let code = normalize_discount_code(code)?;
        debug!(%code, subtotal_base = %subtotal_base, "Validating discount code");

        let request = DiscountRequest {
            code: code.clone(),
            subtotal_base: subtotal_base.amount(),
        };
        let response = self.backend.validate_discount(&request).await?;

        if !response.is_valid {
            let reason = DiscountRejection::from_reason(response.reason.as_deref());
            info!(%code, ?reason, "Discount code rejected");
            return Err(CheckoutError::DiscountRejected {
                reason,
                message: response
                    .message
                    .unwrap_or_else(|| format!("Discount code {} is not valid", code)),
            });
        }

        let mut discount = response.discount.ok_or_else(|| {
            BackendError::Decode("valid discount response carried no discount".to_string())
        })?;
        if response.discount_amount.is_some() {
            discount.calculated_amount_base = response.discount_amount;
        }

        info!(code = %discount.code, amount_base = ?discount.calculated_amount_base, "Discount code accepted");
        Ok(discount)
    }
}

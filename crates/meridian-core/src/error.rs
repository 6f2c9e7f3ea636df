//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - Money and cart rule violations                 │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  meridian-checkout errors (separate crate)                             │
//! │  ├── BackendError     - Transport / decode failures                    │
//! │  └── CheckoutError    - What the checkout UI sees                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → UI                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::CurrencyCode;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Two amounts in different currencies were combined without conversion.
    ///
    /// ## When This Occurs
    /// - Adding a base-currency amount to a display-currency amount
    /// - Converting with a rate whose base does not match the amount
    #[error("Currency mismatch: expected {expected}, got {found}")]
    CurrencyMismatch {
        expected: CurrencyCode,
        found: CurrencyCode,
    },

    /// Exchange rate is zero or negative.
    #[error("Exchange rate for {currency} must be positive")]
    InvalidExchangeRate { currency: CurrencyCode },

    /// Amount overflowed the decimal range.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// No line in the cart matches the key.
    #[error("Line not in cart: {0}")]
    LineNotFound(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are surfaced inline and never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed discount code or currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// One or more cart lines lack a size or color.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout ──► StockGate
    ///                 │
    ///                 ▼
    ///   line "tee-01" has no color
    ///                 │
    ///                 ▼
    ///   MissingVariant { products: ["tee-01"] }   (no network call made)
    /// ```
    #[error("Missing variant information (size/color) for: {}", products.join(", "))]
    MissingVariant { products: Vec<String> },

    /// Checkout attempted with nothing to buy.
    #[error("Cart is empty")]
    EmptyCart,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::CurrencyMismatch {
            expected: CurrencyCode::new("USD"),
            found: CurrencyCode::new("EUR"),
        };
        assert_eq!(err.to_string(), "Currency mismatch: expected USD, got EUR");
    }

    #[test]
    fn test_missing_variant_names_products() {
        let err = ValidationError::MissingVariant {
            products: vec!["tee-01".to_string(), "cap-07".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing variant information (size/color) for: tee-01, cap-07"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::EmptyCart.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}

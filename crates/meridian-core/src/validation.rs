//! # Validation Module
//!
//! Input validation that runs before anything reaches the network.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Checkout UI                                                   │
//! │  └── Immediate feedback (empty fields, obvious typos)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── discount code shape, quantities, variants                          │
//! │  └── currency catalog sanity                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Remote authorities                                            │
//! │  └── discount validity, stock levels, payment                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::validation::{normalize_discount_code, validate_quantity};
//!
//! assert_eq!(normalize_discount_code("  save10 ").unwrap(), "SAVE10");
//! assert!(validate_quantity(5).is_ok());
//! ```

use rust_decimal::Decimal;

use crate::cart::CartLineItem;
use crate::error::ValidationError;
use crate::types::CurrencyOption;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest discount code the authority accepts.
pub const MAX_DISCOUNT_CODE_LEN: usize = 32;

// =============================================================================
// String Validators
// =============================================================================

/// Trims, upper-cases and checks a discount code.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 32 characters
/// - Only `A-Z`, `0-9`, `-` and `_`
///
/// ## Example
/// ```rust
/// use meridian_core::validation::normalize_discount_code;
///
/// assert_eq!(normalize_discount_code("summer-24").unwrap(), "SUMMER-24");
/// assert!(normalize_discount_code("   ").is_err());
/// assert!(normalize_discount_code("50% OFF").is_err());
/// ```
pub fn normalize_discount_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "discount code".to_string(),
        });
    }

    if code.chars().count() > MAX_DISCOUNT_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "discount code".to_string(),
            max: MAX_DISCOUNT_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "discount code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code)
}

/// Validates a three-letter currency code.
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO code".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Checks a catalog entry before it is offered to the shopper.
///
/// `rate_to_base` must be strictly positive; a zero rate would price
/// everything at nothing.
pub fn validate_currency_option(option: &CurrencyOption) -> ValidationResult<()> {
    validate_currency_code(option.code.as_str())?;

    if option.rate_to_base <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: format!("rateToBase ({})", option.code),
        });
    }

    if option.decimals > 8 {
        return Err(ValidationError::OutOfRange {
            field: "decimals".to_string(),
            min: 0,
            max: 8,
        });
    }

    Ok(())
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Every line must carry both a size and a color before stock is checked.
///
/// ## User Workflow
/// ```text
/// Checkout clicked
///      │
///      ▼
/// validate_variants(lines) ← THIS FUNCTION
///      │
///      ├── any line without size/color? → MissingVariant { products }
///      │                                   (stock service never called)
///      └── OK → StockGate remote check
/// ```
pub fn validate_variants(lines: &[CartLineItem]) -> ValidationResult<()> {
    let missing: Vec<String> = lines
        .iter()
        .filter(|line| !line.variant.is_complete())
        .map(|line| line.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingVariant { products: missing })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{fallback_currencies, ProductSnapshot, VariantSelection};
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_code_normalized() {
        assert_eq!(normalize_discount_code(" welcome_5 ").unwrap(), "WELCOME_5");
    }

    #[test]
    fn test_discount_code_rules() {
        assert!(matches!(
            normalize_discount_code(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            normalize_discount_code(&"A".repeat(33)),
            Err(ValidationError::TooLong { max: 32, .. })
        ));
        assert!(normalize_discount_code(&"A".repeat(32)).is_ok());
        assert!(matches!(
            normalize_discount_code("SAVE 10"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(normalize_discount_code("ÉTÉ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_currency_code() {
        assert!(validate_currency_code("usd").is_ok());
        assert!(validate_currency_code("").is_err());
        assert!(validate_currency_code("EURO").is_err());
        assert!(validate_currency_code("U5D").is_err());
    }

    #[test]
    fn test_currency_option_rate_must_be_positive() {
        let mut eur = fallback_currencies().remove(1);
        assert!(validate_currency_option(&eur).is_ok());

        eur.rate_to_base = dec!(0);
        assert!(matches!(
            validate_currency_option(&eur),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_missing_variants_named() {
        let product = |id: &str| ProductSnapshot {
            product_id: id.to_string(),
            name: format!("{} name", id),
            price_base: Money::new(dec!(10), "USD".into()),
            compare_at_price_base: None,
        };
        let complete = CartLineItem::from_product(&product("tee"), 1, VariantSelection::new("M", "Red"));
        let no_color = CartLineItem::from_product(
            &product("cap"),
            1,
            VariantSelection {
                size: Some("OS".to_string()),
                color: None,
            },
        );

        assert!(validate_variants(std::slice::from_ref(&complete)).is_ok());
        assert_eq!(
            validate_variants(&[complete, no_color]),
            Err(ValidationError::MissingVariant {
                products: vec!["cap name".to_string()]
            })
        );
    }
}

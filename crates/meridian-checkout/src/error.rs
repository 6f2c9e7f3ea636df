//! # Checkout Error Types
//!
//! Error types for everything that talks to the outside world.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  BackendError   │  │  ConfigError    │  │  PersistenceError       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Transport      │  │  Io / Parse     │  │  Io                     │ │
//! │  │  Status         │  │  Invalid        │  │  Encode / Decode        │ │
//! │  │  Decode / Url   │  │                 │  │                         │ │
//! │  └────────┬────────┘  └─────────────────┘  └───────────┬─────────────┘ │
//! │           │                                            │               │
//! │           ▼                                            ▼               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  CheckoutError  (what the checkout UI sees, with an ErrorCode)  │   │
//! │  │  Validation • InsufficientStock • Undeliverable                 │   │
//! │  │  DiscountRejected • StaleContext • Backend • Internal           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use meridian_core::{CoreError, ValidationError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Backend Error
// =============================================================================

/// A failed round trip to the checkout backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Connection refused, reset, TLS failure and similar.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// True for 404 responses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for BackendError {
    fn from(err: url::ParseError) -> Self {
        BackendError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Config Error
// =============================================================================

/// Configuration could not be loaded or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Persistence Error
// =============================================================================

/// Client-local cart state could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Cart state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cart state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Discount Rejection
// =============================================================================

/// Why the discount authority refused a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountRejection {
    NotFound,
    Expired,
    BelowMinimum,
    UsageExhausted,
    Other,
}

impl DiscountRejection {
    /// Classifies an authority reason code, falling back to `Other`.
    pub fn from_reason(reason: Option<&str>) -> Self {
        match reason.map(|r| r.trim().to_ascii_uppercase()).as_deref() {
            Some("NOT_FOUND") | Some("INVALID") => DiscountRejection::NotFound,
            Some("EXPIRED") | Some("INACTIVE") => DiscountRejection::Expired,
            Some("BELOW_MINIMUM") | Some("MIN_AMOUNT") => DiscountRejection::BelowMinimum,
            Some("USAGE_EXHAUSTED") | Some("USAGE_LIMIT") => DiscountRejection::UsageExhausted,
            _ => DiscountRejection::Other,
        }
    }
}

// =============================================================================
// Stock Shortfall
// =============================================================================

/// One line the stock service cannot satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product: String,
    pub size: String,
    pub color: String,
    pub requested: i64,
    pub current_stock: i64,
    pub message: Option<String>,
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({}/{}): {}", self.product, self.size, self.color, message),
            None => write!(
                f,
                "{} ({}/{}): requested {}, {} available",
                self.product, self.size, self.color, self.requested, self.current_stock
            ),
        }
    }
}

fn shortfall_lines(lines: &[StockShortfall]) -> String {
    lines
        .iter()
        .map(|line| format!("\n  - {}", line))
        .collect()
}

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors surfaced by the store, the engines and the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Input rejected locally. Never reached the network.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Cart or money rule violated.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Every line that cannot be satisfied, in one error.
    #[error("Insufficient stock:{}", shortfall_lines(.lines))]
    InsufficientStock { lines: Vec<StockShortfall> },

    /// The selected address has no active shipping rate or no tax rate.
    #[error("We cannot deliver to {destination}")]
    Undeliverable { destination: String },

    /// The authority refused the code; the previous discount is untouched.
    #[error("{message}")]
    DiscountRejected {
        reason: DiscountRejection,
        message: String,
    },

    /// A response arrived for a context that no longer exists.
    #[error("Discarded stale response for {0}")]
    StaleContext(String),

    /// Selected currency is not in the catalog.
    #[error("Unsupported currency: {0}")]
    UnknownCurrency(String),

    /// A payment attempt is already running.
    #[error("A payment is already in progress")]
    PaymentInProgress,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error codes for the checkout UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed
    ValidationError,

    /// One or more lines out of stock
    InsufficientStock,

    /// No shipping or tax for the destination
    Undeliverable,

    /// Discount authority said no
    DiscountRejected,

    /// Response dropped because the context moved on
    StaleContext,

    /// Network or backend failure
    BackendError,

    /// Everything else
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::Undeliverable => "UNDELIVERABLE",
            ErrorCode::DiscountRejected => "DISCOUNT_REJECTED",
            ErrorCode::StaleContext => "STALE_CONTEXT",
            ErrorCode::BackendError => "BACKEND_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the checkout UI receives when an operation fails.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock:\n  - Tee (M/Black): ..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl CheckoutError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CheckoutError::Validation(_)
            | CheckoutError::UnknownCurrency(_)
            | CheckoutError::PaymentInProgress => ErrorCode::ValidationError,
            CheckoutError::Core(
                CoreError::Validation(_)
                | CoreError::LineNotFound(_)
                | CoreError::CartTooLarge { .. }
                | CoreError::QuantityTooLarge { .. },
            ) => ErrorCode::ValidationError,
            CheckoutError::Core(_) => ErrorCode::Internal,
            CheckoutError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CheckoutError::Undeliverable { .. } => ErrorCode::Undeliverable,
            CheckoutError::DiscountRejected { .. } => ErrorCode::DiscountRejected,
            CheckoutError::StaleContext(_) => ErrorCode::StaleContext,
            CheckoutError::Backend(_) => ErrorCode::BackendError,
            CheckoutError::Persistence(_) | CheckoutError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the message is meant for the shopper.
    ///
    /// Stale responses are dropped silently and internal failures are logged
    /// and replaced with a generic message.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self.code(),
            ErrorCode::StaleContext | ErrorCode::Internal
        )
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let message = match self.code() {
            ErrorCode::Internal => {
                tracing::error!(error = %self, "Internal checkout error");
                "Something went wrong. Please try again.".to_string()
            }
            ErrorCode::BackendError => {
                tracing::warn!(error = %self, "Backend call failed");
                "We could not reach the store. Please try again.".to_string()
            }
            _ => self.to_string(),
        };
        ErrorPayload {
            code: self.code(),
            message,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shortfall(product: &str, requested: i64, current_stock: i64) -> StockShortfall {
        StockShortfall {
            product: product.to_string(),
            size: "M".to_string(),
            color: "Black".to_string(),
            requested,
            current_stock,
            message: None,
        }
    }

    #[test]
    fn test_insufficient_stock_lists_every_line() {
        let err = CheckoutError::InsufficientStock {
            lines: vec![shortfall("Tee", 3, 1), shortfall("Cap", 2, 0)],
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock:\n  - Tee (M/Black): requested 3, 1 available\n  - Cap (M/Black): requested 2, 0 available"
        );
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CheckoutError::from(ValidationError::EmptyCart).code().as_str(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            CheckoutError::from(CoreError::CartTooLarge { max: 100 }).code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            CheckoutError::from(CoreError::Overflow).code(),
            ErrorCode::Internal
        );
        assert_eq!(
            CheckoutError::from(BackendError::Timeout).code().to_string(),
            "BACKEND_ERROR"
        );
        assert_eq!(
            CheckoutError::Undeliverable {
                destination: "US-AK".into()
            }
            .code(),
            ErrorCode::Undeliverable
        );
    }

    #[test]
    fn test_user_facing() {
        assert!(CheckoutError::DiscountRejected {
            reason: DiscountRejection::Expired,
            message: "Code expired".into(),
        }
        .is_user_facing());
        assert!(!CheckoutError::StaleContext("rates".into()).is_user_facing());
        assert!(!CheckoutError::Internal("boom".into()).is_user_facing());
    }

    #[test]
    fn test_payload_hides_internal_details() {
        let payload = CheckoutError::Internal("mutex state lost".into()).to_payload();
        assert_eq!(payload.code, ErrorCode::Internal);
        assert!(!payload.message.contains("mutex"));

        let json = serde_json::to_value(
            CheckoutError::DiscountRejected {
                reason: DiscountRejection::NotFound,
                message: "Unknown code".into(),
            }
            .to_payload(),
        )
        .unwrap();
        assert_eq!(json["code"], "DISCOUNT_REJECTED");
        assert_eq!(json["message"], "Unknown code");
    }

    #[test]
    fn test_rejection_classification() {
        assert_eq!(
            DiscountRejection::from_reason(Some("expired")),
            DiscountRejection::Expired
        );
        assert_eq!(
            DiscountRejection::from_reason(Some("USAGE_LIMIT")),
            DiscountRejection::UsageExhausted
        );
        assert_eq!(DiscountRejection::from_reason(None), DiscountRejection::Other);
    }

    #[test]
    fn test_not_found_status() {
        let err = BackendError::Status {
            status: 404,
            message: "no tax rate".into(),
        };
        assert!(err.is_not_found());
        assert!(!BackendError::Timeout.is_not_found());
    }
}

//! # Backend Seams
//!
//! The two traits the checkout talks through, and the wire shapes they carry.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutBackend                                                        │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  GET  currencies                         → [CurrencyOption]             │
//! │  GET  languages                          → [LanguageOption]             │
//! │  GET  shipping-rates?country&state       → [ShippingRate] (first wins)  │
//! │  GET  tax-rate?country&state             → TaxRate        (404 ⇒ none)  │
//! │  POST discounts/validate                 → DiscountResponse             │
//! │  POST stock/check                        → StockCheckResponse           │
//! │  POST payments/create-intent             → PaymentIntent                │
//! │                                                                         │
//! │  CardNetwork (vendor SDK lives outside this crate)                      │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  confirm(client_secret, card)            → CardConfirmation             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All bodies are JSON with camelCase field names.

use async_trait::async_trait;
use meridian_core::{
    CurrencyCode, CurrencyOption, DestinationKey, DiscountCode, LanguageOption, ShippingRate,
    TaxRate,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BackendResult;

// =============================================================================
// Traits
// =============================================================================

/// The store's checkout API.
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    async fn currencies(&self) -> BackendResult<Vec<CurrencyOption>>;

    async fn languages(&self) -> BackendResult<Vec<LanguageOption>>;

    /// Every rate the service knows for the destination. The first match wins.
    async fn shipping_rates(&self, destination: &DestinationKey) -> BackendResult<Vec<ShippingRate>>;

    /// `Ok(None)` when the service has no tax rate for the destination.
    async fn tax_rate(&self, destination: &DestinationKey) -> BackendResult<Option<TaxRate>>;

    async fn validate_discount(&self, request: &DiscountRequest) -> BackendResult<DiscountResponse>;

    async fn check_stock(&self, request: &StockCheckRequest) -> BackendResult<StockCheckResponse>;

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> BackendResult<PaymentIntent>;
}

/// The card-capture surface's confirmation call.
#[async_trait]
pub trait CardNetwork: Send + Sync {
    async fn confirm(&self, client_secret: &str, card: &CardHandle)
        -> BackendResult<CardConfirmation>;
}

// =============================================================================
// Discounts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRequest {
    pub code: String,
    pub subtotal_base: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub discount: Option<DiscountCode>,
    /// Authority-calculated amount, base currency.
    #[serde(default)]
    pub discount_amount: Option<Decimal>,
    #[serde(default)]
    pub message: Option<String>,
    /// Machine-readable rejection reason (`EXPIRED`, `NOT_FOUND`, ...).
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckItem {
    pub product_id: String,
    pub size: String,
    pub color: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckRequest {
    pub items: Vec<StockCheckItem>,
}

/// Per-line verdict, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckResult {
    pub available: bool,
    pub current_stock: i64,
    #[serde(default)]
    pub is_low_stock: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckResponse {
    pub all_available: bool,
    pub results: Vec<StockCheckResult>,
}

// =============================================================================
// Payments
// =============================================================================

/// Line snapshot sent with the payment intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i64,
    /// Display currency, unrounded.
    pub unit_price: Decimal,
}

/// What the order will look like once paid. Display currency, unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub items: Vec<OrderLine>,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub discount_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub amount_minor_units: i64,
    pub currency: CurrencyCode,
    pub order_details: OrderDetails,
    pub customer_name: String,
    pub shipping_address_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub order_details: OrderDetails,
}

/// Opaque handle to the card the shopper entered in the capture surface.
///
/// Card data never passes through this crate; only the handle does.
#[derive(Clone, PartialEq, Eq)]
pub struct CardHandle(String);

impl CardHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        CardHandle(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardHandle(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Succeeded,
    RequiresAction,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConfirmation {
    pub status: ConfirmationStatus,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

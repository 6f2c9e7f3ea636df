//! # Domain Types
//!
//! Core domain types used throughout Meridian checkout.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ProductSnapshot │   │ CurrencyOption  │   │ShippingDestination│     │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  code, symbol   │   │  address_id     │       │
//! │  │  price_base     │   │  rate_to_base   │   │  country        │       │
//! │  │  compare_at?    │   │  decimals       │   │  state?         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ShippingRate   │   │    TaxRate      │   │  DiscountCode   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  cost_base      │   │  rate_percent   │   │  kind, value    │       │
//! │  │  is_active      │   │  8 = 8%         │   │  min?/max?      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Base vs Display Currency
//! Every field suffixed `_base` is denominated in the store's base currency.
//! Everything the shopper sees is converted with
//! [`CurrencyOption::exchange_rate`] before display.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{CurrencyCode, ExchangeRate, Money};

// =============================================================================
// Products and Variants
// =============================================================================

/// Size/color selection for a cart line.
///
/// Both fields are optional while browsing; checkout requires both
/// (see [`validate_variants`](crate::validation::validate_variants)).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VariantSelection {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl VariantSelection {
    pub fn new(size: impl Into<String>, color: impl Into<String>) -> Self {
        VariantSelection {
            size: Some(size.into()),
            color: Some(color.into()),
        }
    }

    /// Both size and color are chosen.
    pub fn is_complete(&self) -> bool {
        self.size.is_some() && self.color.is_some()
    }
}

/// Identity of a cart line: `(product_id, size, color)`.
///
/// Adding a product with an identical key increments the existing line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineKey {
    pub product_id: String,
    pub variant: VariantSelection,
}

impl LineKey {
    pub fn new(product_id: impl Into<String>, variant: VariantSelection) -> Self {
        LineKey {
            product_id: product_id.into(),
            variant,
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{})",
            self.product_id,
            self.variant.size.as_deref().unwrap_or("-"),
            self.variant.color.as_deref().unwrap_or("-"),
        )
    }
}

/// Product data handed to the cart by the catalog UI.
///
/// The price is read once, at add time, and frozen into the cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    /// Unit price in the base currency.
    pub price_base: Money,
    /// Strike-through "was" price, base currency.
    pub compare_at_price_base: Option<Money>,
}

// =============================================================================
// Currency Catalog
// =============================================================================

/// Where the currency symbol is placed relative to the amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SymbolPosition {
    #[default]
    Before,
    After,
}

/// A currency the shopper may select.
///
/// ## Conversion
/// `rate_to_base` converts ONE base unit into this currency:
/// `display = base × rate_to_base`. The base currency itself has rate 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CurrencyOption {
    pub code: CurrencyCode,
    pub symbol: String,
    #[ts(type = "string")]
    pub rate_to_base: Decimal,
    pub decimals: u32,
    #[serde(default)]
    pub position: SymbolPosition,
    #[serde(default)]
    pub is_default: bool,
}

impl CurrencyOption {
    /// Builds the base → this-currency exchange rate.
    pub fn exchange_rate(&self, base: &CurrencyCode) -> CoreResult<ExchangeRate> {
        ExchangeRate::new(base.clone(), self.code.clone(), self.rate_to_base)
    }

    /// Formats a display-currency amount, rounding to `decimals` places.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::{CurrencyCode, Money};
    /// use meridian_core::types::fallback_currencies;
    /// use rust_decimal::Decimal;
    ///
    /// let eur = fallback_currencies().into_iter().find(|c| c.code.as_str() == "EUR").unwrap();
    /// let total = Money::new(Decimal::new(418115, 4), CurrencyCode::new("EUR"));
    /// assert_eq!(eur.format(&total).unwrap(), "€41.81");
    /// ```
    pub fn format(&self, money: &Money) -> CoreResult<String> {
        money.ensure_currency(&self.code)?;
        let mut amount = money.round_to(self.decimals).amount();
        amount.rescale(self.decimals);
        Ok(match self.position {
            SymbolPosition::Before => format!("{}{}", self.symbol, amount),
            SymbolPosition::After => format!("{} {}", amount, self.symbol),
        })
    }
}

/// Built-in currency set, used only when the remote catalog is unreachable.
///
/// USD is the base currency.
pub fn fallback_currencies() -> Vec<CurrencyOption> {
    vec![
        CurrencyOption {
            code: CurrencyCode::new("USD"),
            symbol: "$".to_string(),
            rate_to_base: Decimal::ONE,
            decimals: 2,
            position: SymbolPosition::Before,
            is_default: true,
        },
        CurrencyOption {
            code: CurrencyCode::new("EUR"),
            symbol: "€".to_string(),
            rate_to_base: Decimal::new(85, 2),
            decimals: 2,
            position: SymbolPosition::Before,
            is_default: false,
        },
        CurrencyOption {
            code: CurrencyCode::new("GBP"),
            symbol: "£".to_string(),
            rate_to_base: Decimal::new(73, 2),
            decimals: 2,
            position: SymbolPosition::Before,
            is_default: false,
        },
        CurrencyOption {
            code: CurrencyCode::new("JPY"),
            symbol: "¥".to_string(),
            rate_to_base: Decimal::from(110),
            decimals: 0,
            position: SymbolPosition::Before,
            is_default: false,
        },
    ]
}

/// A UI language the shopper may select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LanguageOption {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Built-in language set, used only when the remote list is unreachable.
pub fn fallback_languages() -> Vec<LanguageOption> {
    vec![LanguageOption {
        code: "en".to_string(),
        name: "English".to_string(),
        is_default: true,
    }]
}

// =============================================================================
// Shipping Destination
// =============================================================================

/// A saved shipping address. Pricing only reads `country` and `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShippingDestination {
    /// Address book id, forwarded to the payment intent.
    pub address_id: String,
    pub recipient_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl ShippingDestination {
    /// The part of the address rate lookups are keyed on.
    pub fn rate_key(&self) -> DestinationKey {
        DestinationKey::new(&self.country, self.state.as_deref())
    }
}

/// Rate lookup key: `(country, state?)`, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationKey {
    pub country: String,
    pub state: Option<String>,
}

impl DestinationKey {
    pub fn new(country: &str, state: Option<&str>) -> Self {
        DestinationKey {
            country: country.trim().to_uppercase(),
            state: state
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        }
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => write!(f, "{}-{}", self.country, state),
            None => f.write_str(&self.country),
        }
    }
}

// =============================================================================
// Rates
// =============================================================================

/// Flat shipping cost for a destination. Missing or inactive ⇒ undeliverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShippingRate {
    pub country_code: String,
    pub state_code: Option<String>,
    #[ts(type = "string")]
    pub shipping_cost_base: Decimal,
    pub is_active: bool,
}

/// Sales tax for a destination, as a percentage (8 = 8%).
///
/// A missing tax rate means undeliverable, never zero tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaxRate {
    pub country_code: String,
    pub state_code: Option<String>,
    #[ts(type = "string")]
    pub rate_percent: Decimal,
}

// =============================================================================
// Discount
// =============================================================================

/// How a discount's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum DiscountKind {
    /// `value` is a percentage of the subtotal.
    Percentage,
    /// `value` is an amount in the base currency.
    Fixed,
}

/// A validated discount code. All amounts are base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DiscountCode {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    #[ts(type = "string")]
    pub value: Decimal,
    #[ts(type = "string | null")]
    pub min_amount_base: Option<Decimal>,
    #[ts(type = "string | null")]
    pub max_discount_base: Option<Decimal>,
    /// Amount computed by the discount authority. Used verbatim when present.
    #[ts(type = "string | null")]
    #[serde(default)]
    pub calculated_amount_base: Option<Decimal>,
}

// =============================================================================
// Unit Tests
// =============================================================================

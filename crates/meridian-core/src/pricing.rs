//! # Pricing Aggregator
//!
//! Pure functions that turn a cart, a currency, an optional discount and the
//! resolved destination rates into display-currency totals.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    compute_totals(input)                                │
//! │                                                                         │
//! │  cart.subtotal_base() ──convert──► subtotal                             │
//! │                                                                         │
//! │  discount ──► authority amount? ──yes──► convert, use verbatim          │
//! │                     │ no                                                │
//! │                     ▼                                                   │
//! │           below min? → 0                                                │
//! │           PERCENTAGE → subtotal × value/100                             │
//! │           FIXED      → convert(value)                                   │
//! │           clamp to convert(max)                                         │
//! │                                                                         │
//! │  Priced mode only (address + active shipping + tax):                    │
//! │    shipping = convert(shipping_cost_base)                               │
//! │    tax      = max(0, subtotal − discount) × rate%    (no shipping!)     │
//! │                                                                         │
//! │  total = max(0, subtotal + shipping + tax − discount)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here rounds. Rounding happens in [`OrderTotals::format`] and
//! when the total is turned into minor units for the payment intent.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::error::CoreResult;
use crate::money::{convert, ExchangeRate, Money};
use crate::types::{CurrencyOption, DiscountCode, DiscountKind, ShippingRate, TaxRate};

// =============================================================================
// Inputs
// =============================================================================

/// What is known about delivery to the selected address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery<'a> {
    /// No address selected.
    NoDestination,
    /// Address selected, shipping or tax lookup still in flight.
    AwaitingRates,
    /// Both lookups finished. `None` means the service had no rate.
    Resolved {
        shipping: Option<&'a ShippingRate>,
        tax: Option<&'a TaxRate>,
    },
}

impl Delivery<'_> {
    /// `address && shipping && shipping.is_active && tax`
    pub fn is_deliverable(&self) -> bool {
        matches!(
            self,
            Delivery::Resolved {
                shipping: Some(shipping),
                tax: Some(_),
            } if shipping.is_active
        )
    }

    pub fn mode(&self) -> PricingMode {
        match self {
            Delivery::NoDestination => PricingMode::NoDestination,
            Delivery::AwaitingRates => PricingMode::AwaitingRates,
            Delivery::Resolved { .. } if self.is_deliverable() => PricingMode::Priced,
            Delivery::Resolved { .. } => PricingMode::Undeliverable,
        }
    }
}

/// Everything the aggregator reads.
#[derive(Debug, Clone, Copy)]
pub struct PricingInput<'a> {
    pub cart: &'a Cart,
    pub currency: &'a CurrencyOption,
    pub discount: Option<&'a DiscountCode>,
    pub delivery: Delivery<'a>,
}

// =============================================================================
// Outputs
// =============================================================================

/// Which formula produced the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum PricingMode {
    /// Subtotal minus discount only.
    NoDestination,
    /// Same figures as `NoDestination`; the address is still being priced.
    AwaitingRates,
    /// Same figures as `NoDestination`; the address cannot be shipped to.
    Undeliverable,
    /// Shipping and tax included.
    Priced,
}

/// Order totals in the display currency.
///
/// Derived on every read and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total: Money,
    pub mode: PricingMode,
    /// Gates payment.
    pub is_deliverable: bool,
}

/// Totals rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FormattedTotals {
    pub subtotal: String,
    pub shipping_cost: String,
    pub tax_amount: String,
    pub discount_amount: String,
    pub total: String,
}

impl OrderTotals {
    /// Formats every figure with the currency's symbol, position and decimals.
    pub fn format(&self, currency: &CurrencyOption) -> CoreResult<FormattedTotals> {
        Ok(FormattedTotals {
            subtotal: currency.format(&self.subtotal)?,
            shipping_cost: currency.format(&self.shipping_cost)?,
            tax_amount: currency.format(&self.tax_amount)?,
            discount_amount: currency.format(&self.discount_amount)?,
            total: currency.format(&self.total)?,
        })
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Computes the totals for the current context.
///
/// ## Worked Example
/// ```rust
/// use meridian_core::cart::Cart;
/// use meridian_core::money::Money;
/// use meridian_core::pricing::{compute_totals, Delivery, PricingInput};
/// use meridian_core::types::{fallback_currencies, ProductSnapshot, ShippingRate, TaxRate, VariantSelection};
/// use rust_decimal::Decimal;
///
/// let mut cart = Cart::new("USD".into());
/// let tee = ProductSnapshot {
///     product_id: "tee".into(),
///     name: "Tee".into(),
///     price_base: Money::new(Decimal::new(2000, 2), "USD".into()),
///     compare_at_price_base: None,
/// };
/// cart.add_item(&tee, 2, VariantSelection::new("M", "Black")).unwrap();
///
/// let eur = fallback_currencies().remove(1);
/// let shipping = ShippingRate {
///     country_code: "US".into(),
///     state_code: None,
///     shipping_cost_base: Decimal::new(599, 2),
///     is_active: true,
/// };
/// let tax = TaxRate { country_code: "US".into(), state_code: None, rate_percent: Decimal::from(8) };
///
/// let totals = compute_totals(&PricingInput {
///     cart: &cart,
///     currency: &eur,
///     discount: None,
///     delivery: Delivery::Resolved { shipping: Some(&shipping), tax: Some(&tax) },
/// })
/// .unwrap();
///
/// assert_eq!(totals.total.amount(), Decimal::new(418115, 4)); // 41.8115
/// ```
pub fn compute_totals(input: &PricingInput<'_>) -> CoreResult<OrderTotals> {
    let rate = input.currency.exchange_rate(input.cart.base_currency())?;
    let display = rate.quote().clone();

    let subtotal_base = input.cart.subtotal_base()?;
    let subtotal = convert(&subtotal_base, &rate)?;
    let discount = discount_amount(input.discount, &subtotal_base, &subtotal, &rate)?;

    let (shipping_cost, tax_amount) = match input.delivery {
        Delivery::Resolved {
            shipping: Some(shipping),
            tax: Some(tax),
        } if shipping.is_active => {
            let shipping_base = Money::new(shipping.shipping_cost_base, rate.base().clone());
            let shipping_cost = convert(&shipping_base, &rate)?;
            let taxable = subtotal.try_sub(&discount)?.non_negative();
            let tax_amount = taxable.percentage(tax.rate_percent)?;
            (shipping_cost, tax_amount)
        }
        _ => (Money::zero(display.clone()), Money::zero(display)),
    };

    let total = subtotal
        .try_add(&shipping_cost)?
        .try_add(&tax_amount)?
        .try_sub(&discount)?
        .non_negative();

    Ok(OrderTotals {
        subtotal,
        shipping_cost,
        tax_amount,
        discount_amount: discount,
        total,
        mode: input.delivery.mode(),
        is_deliverable: input.delivery.is_deliverable(),
    })
}

/// Display-currency discount for `discount` against the current subtotal.
///
/// The authority-calculated amount wins when present. Otherwise the
/// amount is computed locally from the code's kind and value.
pub fn discount_amount(
    discount: Option<&DiscountCode>,
    subtotal_base: &Money,
    subtotal: &Money,
    rate: &ExchangeRate,
) -> CoreResult<Money> {
    let zero = Money::zero(rate.quote().clone());
    let Some(discount) = discount else {
        return Ok(zero);
    };
    let base = |amount| Money::new(amount, rate.base().clone());

    if let Some(calculated) = discount.calculated_amount_base {
        return convert(&base(calculated), rate);
    }

    if let Some(min) = discount.min_amount_base {
        if subtotal_base.amount() < min {
            return Ok(zero);
        }
    }

    let amount = match discount.kind {
        DiscountKind::Percentage => subtotal.percentage(discount.value)?,
        DiscountKind::Fixed => convert(&base(discount.value), rate)?,
    };

    match discount.max_discount_base {
        Some(max) => amount.try_min(&convert(&base(max), rate)?),
        None => Ok(amount),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

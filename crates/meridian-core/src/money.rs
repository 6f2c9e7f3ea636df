//! # Money Module
//!
//! Provides the `Money` type: an exact decimal amount tagged with its
//! currency unit.
//!
//! ## Why Tag Every Amount?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE IMPLICIT CONVERSION PROBLEM                                        │
//! │                                                                         │
//! │  Catalog prices, shipping costs and discount thresholds are authored   │
//! │  in the BASE currency. Totals are shown in the DISPLAY currency.       │
//! │                                                                         │
//! │    subtotal (USD 40.00) + shipping (EUR 5.09)  ❌ meaningless          │
//! │                                                                         │
//! │  OUR SOLUTION: Money carries its currency                               │
//! │    • try_add / try_sub refuse mixed currencies                          │
//! │    • crossing a currency boundary requires convert(money, rate)         │
//! │    • amounts stay exact (rust_decimal) until formatting time            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::money::{convert, CurrencyCode, ExchangeRate, Money};
//! use rust_decimal::Decimal;
//!
//! let usd = CurrencyCode::new("usd");
//! let eur = CurrencyCode::new("EUR");
//!
//! let price = Money::new(Decimal::new(2000, 2), usd.clone()); // 20.00 USD
//! let rate = ExchangeRate::new(usd, eur, Decimal::new(85, 2)).unwrap();
//!
//! let shown = convert(&price, &rate).unwrap();
//! assert_eq!(shown.amount(), Decimal::new(1700, 2)); // 17.00 EUR
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Currency Code
// =============================================================================

/// ISO-4217 style currency code, always stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Creates a code, trimming and upper-casing the input.
    pub fn new(code: impl AsRef<str>) -> Self {
        CurrencyCode(code.as_ref().trim().to_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes on the way in, so `"eur"` from a backend or a saved file
/// compares equal to `CurrencyCode::new("EUR")`.
impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(CurrencyCode::new)
    }
}

impl From<&str> for CurrencyCode {
    fn from(code: &str) -> Self {
        CurrencyCode::new(code)
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in a specific currency.
///
/// ## Design Decisions
/// - **Decimal (not cents)**: converted amounts such as `5.99 × 0.85 = 5.0915`
///   must survive unrounded until the final formatting step
/// - **No operator overloads**: every combination is fallible because the
///   currencies may differ, so arithmetic returns `CoreResult`
///
/// ## Where Money Flows
/// ```text
/// ProductSnapshot.price (base) ──► CartLineItem.unit_price_base
///                                          │
///                                   × quantity, Σ lines
///                                          │
///                                          ▼
///                            subtotal (base) ── convert ──► subtotal (display)
///                                                                 │
///                                  shipping/tax/discount (display)┤
///                                                                 ▼
///                                                          OrderTotals.total
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Money {
    #[ts(type = "string")]
    amount: Decimal,
    currency: CurrencyCode,
}

impl Money {
    /// Creates a Money value.
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Money { amount, currency }
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: CurrencyCode) -> Self {
        Money::new(Decimal::ZERO, currency)
    }

    /// Returns the exact, unrounded amount.
    #[inline]
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency unit.
    #[inline]
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    /// Checks if the value is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Checks if the value is negative.
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Fails unless this amount is in `currency`.
    pub fn ensure_currency(&self, currency: &CurrencyCode) -> CoreResult<()> {
        if &self.currency != currency {
            return Err(CoreError::CurrencyMismatch {
                expected: currency.clone(),
                found: self.currency.clone(),
            });
        }
        Ok(())
    }

    /// Adds two amounts of the same currency.
    pub fn try_add(&self, other: &Money) -> CoreResult<Money> {
        other.ensure_currency(&self.currency)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(CoreError::Overflow)?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Subtracts an amount of the same currency. The result may be negative.
    pub fn try_sub(&self, other: &Money) -> CoreResult<Money> {
        other.ensure_currency(&self.currency)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(CoreError::Overflow)?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Multiplies by a dimensionless factor, keeping the currency.
    pub fn scale(&self, factor: Decimal) -> CoreResult<Money> {
        let amount = self
            .amount
            .checked_mul(factor)
            .ok_or(CoreError::Overflow)?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Multiplies a unit price by a line quantity.
    pub fn multiply_quantity(&self, quantity: i64) -> CoreResult<Money> {
        self.scale(Decimal::from(quantity))
    }

    /// Returns `percent`% of this amount (8 → 8%).
    pub fn percentage(&self, percent: Decimal) -> CoreResult<Money> {
        self.scale(percent / Decimal::ONE_HUNDRED)
    }

    /// Returns the smaller of two amounts of the same currency.
    pub fn try_min(&self, other: &Money) -> CoreResult<Money> {
        other.ensure_currency(&self.currency)?;
        Ok(if other.amount < self.amount {
            other.clone()
        } else {
            self.clone()
        })
    }

    /// Clamps negative amounts to zero: `max(0, self)`.
    pub fn non_negative(&self) -> Money {
        if self.amount.is_sign_negative() {
            Money::zero(self.currency.clone())
        } else {
            self.clone()
        }
    }

    /// Rounds half away from zero to `decimals` places.
    ///
    /// Only formatting and minor-unit conversion call this; intermediate
    /// pricing steps never round.
    pub fn round_to(&self, decimals: u32) -> Money {
        let amount = self
            .amount
            .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
        Money::new(amount, self.currency.clone())
    }

    /// Converts to the smallest currency unit after rounding.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::{CurrencyCode, Money};
    /// use rust_decimal::Decimal;
    ///
    /// let total = Money::new(Decimal::new(418115, 4), CurrencyCode::new("EUR")); // 41.8115
    /// assert_eq!(total.to_minor_units(2).unwrap(), 4181);
    ///
    /// let yen = Money::new(Decimal::new(15005, 1), CurrencyCode::new("JPY")); // 1500.5
    /// assert_eq!(yen.to_minor_units(0).unwrap(), 1501);
    /// ```
    pub fn to_minor_units(&self, decimals: u32) -> CoreResult<i64> {
        let rounded = self.round_to(decimals).amount;
        let scale = Decimal::from(10_i64.checked_pow(decimals).ok_or(CoreError::Overflow)?);
        let minor = rounded.checked_mul(scale).ok_or(CoreError::Overflow)?;
        i64::try_from(minor).map_err(|_| CoreError::Overflow)
    }

    /// Sums amounts that must all be in `currency`.
    pub fn try_sum<'a>(
        iter: impl IntoIterator<Item = &'a Money>,
        currency: &CurrencyCode,
    ) -> CoreResult<Money> {
        iter.into_iter()
            .try_fold(Money::zero(currency.clone()), |acc, m| acc.try_add(m))
    }
}

/// Debug-oriented rendering (`41.8115 EUR`). Use
/// [`CurrencyOption::format`](crate::types::CurrencyOption::format) for UI text.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Converts amounts from `base` into `quote`: `quote = base × rate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRate {
    base: CurrencyCode,
    quote: CurrencyCode,
    rate: Decimal,
}

impl ExchangeRate {
    /// Creates a rate; the rate must be strictly positive.
    pub fn new(base: CurrencyCode, quote: CurrencyCode, rate: Decimal) -> CoreResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(CoreError::InvalidExchangeRate { currency: quote });
        }
        Ok(ExchangeRate { base, quote, rate })
    }

    /// The identity rate for a currency.
    pub fn identity(currency: CurrencyCode) -> Self {
        ExchangeRate {
            base: currency.clone(),
            quote: currency,
            rate: Decimal::ONE,
        }
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn quote(&self) -> &CurrencyCode {
        &self.quote
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }
}

/// Converts `money` across a currency boundary.
///
/// This is the only sanctioned way to turn a base-currency amount into a
/// display-currency amount.
pub fn convert(money: &Money, rate: &ExchangeRate) -> CoreResult<Money> {
    money.ensure_currency(&rate.base)?;
    let amount = money
        .amount
        .checked_mul(rate.rate)
        .ok_or(CoreError::Overflow)?;
    Ok(Money::new(amount, rate.quote.clone()))
}

// =============================================================================
// Unit Tests
// =============================================================================

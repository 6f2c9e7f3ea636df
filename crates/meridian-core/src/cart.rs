//! # Cart
//!
//! The line-item container behind the checkout.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  add_item(product, qty, variant)                                        │
//! │     ├── key (product, size, color) already present? → quantity += qty  │
//! │     └── otherwise → push new line, price frozen NOW                     │
//! │                                                                         │
//! │  set_quantity(key, qty)                                                 │
//! │     ├── qty <= 0 → remove line                                          │
//! │     └── otherwise → replace quantity                                    │
//! │                                                                         │
//! │  remove_item(key) / clear()                                             │
//! │                                                                         │
//! │  subtotal_base() = Σ unit_price_base × quantity   (base currency)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is base currency. Display conversion happens in
//! [`pricing`](crate::pricing).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{CurrencyCode, Money};
use crate::types::{LineKey, ProductSnapshot, VariantSelection};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// ## Design Notes
/// - `unit_price_base` is a frozen copy of the product price at add time.
///   Later catalog price changes do not reach lines already in the cart.
/// - Identity is [`LineKey`]: the same product in two sizes is two lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLineItem {
    pub product_id: String,

    /// Product name at time of adding (frozen)
    pub name: String,

    pub variant: VariantSelection,

    /// Price at time of adding (frozen), base currency
    pub unit_price_base: Money,

    pub compare_at_price_base: Option<Money>,

    /// Always > 0
    pub quantity: i64,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLineItem {
    /// Creates a line from a product snapshot, freezing its price.
    pub fn from_product(product: &ProductSnapshot, quantity: i64, variant: VariantSelection) -> Self {
        CartLineItem {
            product_id: product.product_id.clone(),
            name: product.name.clone(),
            variant,
            unit_price_base: product.price_base.clone(),
            compare_at_price_base: product.compare_at_price_base.clone(),
            quantity,
            added_at: Utc::now(),
        }
    }

    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant.clone())
    }

    fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.variant == key.variant
    }

    /// Unit price × quantity, base currency.
    pub fn line_total_base(&self) -> CoreResult<Money> {
        self.unit_price_base.multiply_quantity(self.quantity)
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by [`LineKey`]
/// - Every quantity is in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` lines
/// - Every unit price is in `base_currency`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    base_currency: CurrencyCode,
    items: Vec<CartLineItem>,
}

impl Cart {
    /// Creates an empty cart priced in `base_currency`.
    pub fn new(base_currency: CurrencyCode) -> Self {
        Cart {
            base_currency,
            items: Vec::new(),
        }
    }

    /// Rebuilds a cart from persisted lines, re-checking every invariant.
    ///
    /// Duplicate keys are merged the same way `add_item` would merge them.
    pub fn from_lines(base_currency: CurrencyCode, lines: Vec<CartLineItem>) -> CoreResult<Self> {
        let mut cart = Cart::new(base_currency);
        for line in lines {
            validate_quantity(line.quantity)?;
            line.unit_price_base.ensure_currency(&cart.base_currency)?;
            let key = line.key();
            match cart.items.iter_mut().find(|i| i.matches(&key)) {
                Some(existing) => {
                    existing.quantity = merged_quantity(existing.quantity, line.quantity)?;
                }
                None => cart.push_line(line)?,
            }
        }
        Ok(cart)
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Adds a product or increases the quantity of a matching line.
    ///
    /// The unit price of an existing line is never replaced.
    pub fn add_item(
        &mut self,
        product: &ProductSnapshot,
        quantity: i64,
        variant: VariantSelection,
    ) -> CoreResult<()> {
        validate_quantity(quantity)?;
        product.price_base.ensure_currency(&self.base_currency)?;

        let key = LineKey::new(product.product_id.clone(), variant.clone());
        if let Some(item) = self.items.iter_mut().find(|i| i.matches(&key)) {
            item.quantity = merged_quantity(item.quantity, quantity)?;
            return Ok(());
        }

        self.push_line(CartLineItem::from_product(product, quantity, variant))
    }

    fn push_line(&mut self, line: CartLineItem) -> CoreResult<()> {
        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }
        self.items.push(line);
        Ok(())
    }

    /// Replaces a line's quantity; `quantity <= 0` removes the line.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return self.remove_item(key);
        }
        validate_quantity(quantity)?;

        let item = self
            .items
            .iter_mut()
            .find(|i| i.matches(key))
            .ok_or_else(|| CoreError::LineNotFound(key.to_string()))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Removes a line by key.
    pub fn remove_item(&mut self, key: &LineKey) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| !i.matches(key));

        if self.items.len() == initial_len {
            Err(CoreError::LineNotFound(key.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Σ(unit price × quantity), base currency.
    pub fn subtotal_base(&self) -> CoreResult<Money> {
        self.items.iter().try_fold(
            Money::zero(self.base_currency.clone()),
            |acc, item| acc.try_add(&item.line_total_base()?),
        )
    }
}

fn merged_quantity(current: i64, added: i64) -> CoreResult<i64> {
    let merged = current.saturating_add(added);
    if merged > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: merged,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(merged)
}

// =============================================================================
// Unit Tests
// =============================================================================

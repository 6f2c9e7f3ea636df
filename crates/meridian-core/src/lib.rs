//! # meridian-core: Pure Pricing Logic for Meridian Checkout
//!
//! This crate holds every pricing rule of the checkout as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Meridian Checkout Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Checkout UI                                  │   │
//! │  │    Cart ──► Currency ──► Address ──► Discount ──► Pay           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               meridian-checkout (I/O)                           │   │
//! │  │    CartStore, RateResolver, DiscountEngine, StockGate, Payment  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ meridian-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │  money  │ │  types  │ │  cart   │ │ pricing │ │validation│ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO FILES • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Currency-tagged decimal amounts and explicit conversion
//! - [`types`] - Catalog, destination, rate and discount records
//! - [`cart`] - Line-item container with merge-by-identity
//! - [`pricing`] - Subtotal, shipping, tax, discount and total
//! - [`validation`] - Input rules checked before any network call
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same cart and context in, same totals out
//! 2. **Tagged Money**: mixing currencies without `convert` is an error
//! 3. **Round Late**: amounts stay exact until formatting
//! 4. **Explicit Errors**: typed errors, never panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLineItem};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{convert, CurrencyCode, ExchangeRate, Money};
pub use pricing::{compute_totals, Delivery, FormattedTotals, OrderTotals, PricingInput, PricingMode};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

//! # Cart Store
//!
//! The single mutable state container behind the checkout UI: items,
//! currency, address, applied discount, resolved rates and language.
//!
//! ## Thread Safety
//! State sits behind a `std::sync::Mutex`. The lock is taken for short,
//! synchronous sections only and is never held across an `.await`. Every
//! network call captures a context counter before suspending and re-checks
//! it afterwards.
//!
//! ## Invalidation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Mutation                 Clears                        Bumps           │
//! │  ────────                 ──────                        ─────           │
//! │  add/remove/set_quantity  authority discount amount     cart, revision  │
//! │  clear                    items, discount               cart, revision  │
//! │  set_currency (changed)   items, address, rates,        ALL             │
//! │                           rate cache, discount                          │
//! │  set_address              rates                         destination,    │
//! │                                                         revision        │
//! │  refresh_rates            cached rates for the key      destination     │
//! │  apply/remove_discount    previous discount             revision        │
//! │                                                                         │
//! │  Stale-response guard:                                                  │
//! │    rates    apply only if `destination_epoch` is unchanged              │
//! │    discount applies only if `cart_epoch`, `currency_epoch` and        │
//! │             `discount_epoch` are unchanged                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use meridian_core::{
    compute_totals, Cart, CartLineItem, CurrencyCode, CurrencyOption, Delivery, DestinationKey,
    DiscountCode, FormattedTotals, LanguageOption, LineKey, OrderTotals, PricingInput,
    ProductSnapshot, ShippingDestination, VariantSelection,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::backend::CheckoutBackend;
use crate::discount::DiscountEngine;
use crate::error::{CheckoutError, CheckoutResult};
use crate::lock;
use crate::persistence::{CartPersistence, PersistedCart};
use crate::rates::{CurrencyCatalog, DestinationRates, RateResolver, UndeliverableReason};

// =============================================================================
// State
// =============================================================================

/// Rate resolution for the selected address.
#[derive(Debug, Clone, PartialEq)]
enum RateStatus {
    NoDestination,
    Pending(DestinationKey),
    Resolved(DestinationKey, DestinationRates),
}

impl RateStatus {
    fn delivery(&self) -> Delivery<'_> {
        match self {
            RateStatus::NoDestination => Delivery::NoDestination,
            RateStatus::Pending(_) => Delivery::AwaitingRates,
            RateStatus::Resolved(_, rates) => rates.delivery(),
        }
    }
}

#[derive(Debug)]
struct StoreState {
    cart: Cart,
    currency: CurrencyOption,
    address: Option<ShippingDestination>,
    rates: RateStatus,
    discount: Option<DiscountCode>,
    language: Option<String>,

    /// Bumped when the currency changes.
    currency_epoch: u64,
    /// Bumped when the address changes or its rates are refreshed.
    destination_epoch: u64,
    /// Bumped when the lines change.
    cart_epoch: u64,
    /// Bumped when a discount is requested or removed.
    discount_epoch: u64,
    /// Bumped by every change that can move the totals.
    revision: u64,
}

impl StoreState {
    fn totals(&self) -> CheckoutResult<OrderTotals> {
        Ok(compute_totals(&PricingInput {
            cart: &self.cart,
            currency: &self.currency,
            discount: self.discount.as_ref(),
            delivery: self.rates.delivery(),
        })?)
    }

    fn persisted(&self) -> PersistedCart {
        PersistedCart {
            items: self.cart.items().to_vec(),
            currency_code: self.currency.code.clone(),
            address: self.address.clone(),
            language_code: self.language.clone(),
        }
    }

    fn undeliverable_reason(&self) -> Option<UndeliverableReason> {
        match &self.rates {
            RateStatus::Resolved(_, rates) => rates.undeliverable_reason(),
            _ => None,
        }
    }

    /// Bookkeeping after the lines changed.
    fn lines_changed(&mut self) {
        self.cart_epoch += 1;
        self.revision += 1;
        // The authority amount was computed for the old subtotal. Fall back
        // to the local rules until the code is applied again.
        if let Some(discount) = self.discount.as_mut() {
            discount.calculated_amount_base = None;
        }
    }
}

// =============================================================================
// Read Models
// =============================================================================

/// Everything the checkout UI renders, taken under one lock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<CartLineItem>,
    pub currency: CurrencyOption,
    pub address: Option<ShippingDestination>,
    pub discount: Option<DiscountCode>,
    pub language: Option<String>,
    pub totals: OrderTotals,
    pub formatted: FormattedTotals,
    pub undeliverable_reason: Option<UndeliverableReason>,
    pub revision: u64,
}

/// What the checkout flow needs, frozen at one revision.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    pub cart: Cart,
    pub currency: CurrencyOption,
    pub address: Option<ShippingDestination>,
    pub discount: Option<DiscountCode>,
    pub totals: OrderTotals,
    pub undeliverable_reason: Option<UndeliverableReason>,
    pub revision: u64,
}

// =============================================================================
// Store
// =============================================================================

pub struct CartStore {
    state: Mutex<StoreState>,
    rates: Arc<RateResolver>,
    discounts: DiscountEngine,
    persistence: Option<Arc<dyn CartPersistence>>,
}

impl CartStore {
    /// Creates an empty store priced in `base_currency`, displaying `currency`.
    pub fn new(
        backend: Arc<dyn CheckoutBackend>,
        base_currency: CurrencyCode,
        currency: CurrencyOption,
    ) -> Self {
        CartStore {
            state: Mutex::new(StoreState {
                cart: Cart::new(base_currency),
                currency,
                address: None,
                rates: RateStatus::NoDestination,
                discount: None,
                language: None,
                currency_epoch: 0,
                destination_epoch: 0,
                cart_epoch: 0,
                discount_epoch: 0,
                revision: 0,
            }),
            rates: Arc::new(RateResolver::new(backend.clone())),
            discounts: DiscountEngine::new(backend),
            persistence: None,
        }
    }

    /// Writes [`PersistedCart`] after every mutation.
    pub fn with_persistence(mut self, persistence: Arc<dyn CartPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Builds a store from the currency catalog and any saved state.
    ///
    /// ## Restore Rules
    /// - Saved currency still in the catalog → selected, lines restored
    /// - Saved currency gone → catalog default, lines dropped
    /// - Saved address → rates fetched again
    /// - Discount and rates are never restored
    pub async fn open(
        backend: Arc<dyn CheckoutBackend>,
        base_currency: CurrencyCode,
        persistence: Option<Arc<dyn CartPersistence>>,
    ) -> CheckoutResult<Self> {
        let resolver = RateResolver::new(backend.clone());
        let catalog = resolver.currency_catalog().await;

        let saved = match persistence.as_ref().map(|p| p.load()).transpose() {
            Ok(saved) => saved.flatten(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cart state");
                None
            }
        };

        let saved_currency = saved
            .as_ref()
            .and_then(|s| catalog.find(&s.currency_code).cloned());
        let currency = match saved_currency.clone().or_else(|| catalog.default_option().cloned()) {
            Some(currency) => currency,
            None => return Err(CheckoutError::Internal("currency catalog is empty".to_string())),
        };

        let store = CartStore {
            rates: Arc::new(resolver),
            ..CartStore::new(backend, base_currency.clone(), currency)
        };
        let store = match persistence {
            Some(p) => store.with_persistence(p),
            None => store,
        };

        let Some(saved) = saved else {
            return Ok(store);
        };

        let address = {
            let mut state = lock(&store.state);
            state.language = saved.language_code;
            if saved_currency.is_some() {
                match Cart::from_lines(base_currency, saved.items) {
                    Ok(cart) => state.cart = cart,
                    Err(e) => warn!(error = %e, "Dropping saved cart lines"),
                }
            } else {
                info!(currency = %saved.currency_code, "Saved currency no longer offered, starting a new cart");
            }
            saved.address
        };

        if let Some(address) = address {
            match store.set_address(Some(address)).await {
                Ok(()) | Err(CheckoutError::StaleContext(_)) => {}
                Err(e) => return Err(e),
            }
        }
        info!(lines = store.with_state(|s| s.cart.item_count()), "Cart state restored");
        Ok(store)
    }

    fn with_state<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&lock(&self.state))
    }

    /// Runs a mutation and persists the result.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> CheckoutResult<R>) -> CheckoutResult<R> {
        let mut state = lock(&self.state);
        let result = f(&mut state)?;
        self.persist(&state);
        Ok(result)
    }

    fn persist(&self, state: &StoreState) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&state.persisted()) {
                warn!(error = %e, "Failed to save cart state");
            }
        }
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Adds a product, merging with an identical `(product, size, color)` line.
    pub fn add_item(
        &self,
        product: &ProductSnapshot,
        quantity: i64,
        variant: VariantSelection,
    ) -> CheckoutResult<()> {
        self.mutate(|state| {
            state.cart.add_item(product, quantity, variant)?;
            state.lines_changed();
            debug!(product_id = %product.product_id, quantity, "Item added");
            Ok(())
        })
    }

    /// `quantity <= 0` removes the line.
    pub fn set_quantity(&self, key: &LineKey, quantity: i64) -> CheckoutResult<()> {
        self.mutate(|state| {
            state.cart.set_quantity(key, quantity)?;
            state.lines_changed();
            Ok(())
        })
    }

    pub fn remove_item(&self, key: &LineKey) -> CheckoutResult<()> {
        self.mutate(|state| {
            state.cart.remove_item(key)?;
            state.lines_changed();
            Ok(())
        })
    }

    /// Empties the cart and drops the discount. Currency and address stay.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.cart.clear();
        state.discount = None;
        state.discount_epoch += 1;
        state.lines_changed();
        self.persist(&state);
        info!("Cart cleared");
    }

    // =========================================================================
    // Currency and Language
    // =========================================================================

    /// Switches the display currency.
    ///
    /// A different code is destructive: items, address, rates and discount
    /// are cleared before anything else happens. The same code is a no-op.
    pub async fn set_currency(&self, code: &CurrencyCode) -> CheckoutResult<()> {
        if self.with_state(|s| &s.currency.code == code) {
            return Ok(());
        }

        let catalog = self.rates.currency_catalog().await;
        let option = catalog
            .find(code)
            .cloned()
            .ok_or_else(|| CheckoutError::UnknownCurrency(code.to_string()))?;

        let switched = self.mutate(|state| {
            if state.currency.code == option.code {
                return Ok(false);
            }
            info!(from = %state.currency.code, to = %option.code, "Currency changed, clearing cart");
            state.currency = option;
            state.cart.clear();
            state.address = None;
            state.rates = RateStatus::NoDestination;
            state.discount = None;
            state.currency_epoch += 1;
            state.destination_epoch += 1;
            state.cart_epoch += 1;
            state.discount_epoch += 1;
            state.revision += 1;
            Ok(true)
        })?;

        // Rates resolved before the switch are never reused
        if switched {
            self.rates.clear();
        }
        Ok(())
    }

    pub fn currency(&self) -> CurrencyOption {
        self.with_state(|s| s.currency.clone())
    }

    pub async fn currency_catalog(&self) -> CurrencyCatalog {
        self.rates.currency_catalog().await
    }

    pub fn set_language(&self, code: &str) -> CheckoutResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(meridian_core::ValidationError::Required {
                field: "language".to_string(),
            }
            .into());
        }
        self.mutate(|state| {
            state.language = Some(code.to_string());
            Ok(())
        })
    }

    pub fn language(&self) -> Option<String> {
        self.with_state(|s| s.language.clone())
    }

    pub async fn languages(&self) -> Vec<LanguageOption> {
        self.rates.languages().await
    }

    // =========================================================================
    // Address and Rates
    // =========================================================================

    /// Selects a shipping address, or none for subtotal-only pricing.
    ///
    /// Returns [`CheckoutError::StaleContext`] when another address change
    /// overtook this one while its rates were loading.
    pub async fn set_address(&self, address: Option<ShippingDestination>) -> CheckoutResult<()> {
        let pending = self.mutate(|state| {
            state.destination_epoch += 1;
            state.revision += 1;
            state.rates = match &address {
                Some(address) => RateStatus::Pending(address.rate_key()),
                None => RateStatus::NoDestination,
            };
            state.address = address;
            Ok(match &state.rates {
                RateStatus::Pending(key) => Some((key.clone(), state.destination_epoch)),
                _ => None,
            })
        })?;

        match pending {
            Some((key, epoch)) => self.load_rates(key, epoch).await,
            None => Ok(()),
        }
    }

    /// Fetches rates for the current address again, replacing the previous
    /// set. Call after the address book changes.
    pub async fn refresh_rates(&self) -> CheckoutResult<()> {
        let pending = {
            let mut state = lock(&self.state);
            match state.address.as_ref().map(ShippingDestination::rate_key) {
                Some(key) => {
                    state.destination_epoch += 1;
                    state.revision += 1;
                    state.rates = RateStatus::Pending(key.clone());
                    Some((key, state.destination_epoch))
                }
                None => None,
            }
        };

        match pending {
            Some((key, epoch)) => {
                self.rates.invalidate(&key);
                self.load_rates(key, epoch).await
            }
            None => Ok(()),
        }
    }

    async fn load_rates(&self, key: DestinationKey, epoch: u64) -> CheckoutResult<()> {
        let rates = self.rates.resolve(&key).await;

        let mut state = lock(&self.state);
        if state.destination_epoch != epoch {
            debug!(destination = %key, "Discarding stale rates");
            return Err(CheckoutError::StaleContext(format!("rates for {}", key)));
        }
        state.rates = RateStatus::Resolved(key, rates);
        state.revision += 1;
        Ok(())
    }

    pub fn address(&self) -> Option<ShippingDestination> {
        self.with_state(|s| s.address.clone())
    }

    // =========================================================================
    // Discount
    // =========================================================================

    /// Validates and applies a code. On any failure the previous discount
    /// stays as it was.
    pub async fn apply_discount(&self, code: &str) -> CheckoutResult<DiscountCode> {
        let (subtotal_base, cart_epoch, currency_epoch, discount_epoch) = {
            let mut state = lock(&self.state);
            let subtotal = state.cart.subtotal_base()?;
            // A newer request or a removal overtakes this one
            state.discount_epoch += 1;
            (
                subtotal,
                state.cart_epoch,
                state.currency_epoch,
                state.discount_epoch,
            )
        };

        let discount = self.discounts.apply(code, &subtotal_base).await?;

        self.mutate(|state| {
            if state.cart_epoch != cart_epoch
                || state.currency_epoch != currency_epoch
                || state.discount_epoch != discount_epoch
            {
                debug!(code = %discount.code, "Discarding stale discount response");
                return Err(CheckoutError::StaleContext(format!(
                    "discount {}",
                    discount.code
                )));
            }
            state.discount = Some(discount.clone());
            state.revision += 1;
            Ok(discount)
        })
    }

    /// Drops the applied discount. Safe to call when none is applied.
    pub fn remove_discount(&self) {
        let mut state = lock(&self.state);
        state.discount_epoch += 1;
        if state.discount.take().is_some() {
            state.revision += 1;
        }
        self.persist(&state);
    }

    pub fn discount(&self) -> Option<DiscountCode> {
        self.with_state(|s| s.discount.clone())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Display-currency totals, recomputed on every call.
    pub fn totals(&self) -> CheckoutResult<OrderTotals> {
        self.with_state(StoreState::totals)
    }

    pub fn is_deliverable(&self) -> bool {
        self.with_state(|s| s.rates.delivery().is_deliverable())
    }

    pub fn revision(&self) -> u64 {
        self.with_state(|s| s.revision)
    }

    pub fn items(&self) -> Vec<CartLineItem> {
        self.with_state(|s| s.cart.items().to_vec())
    }

    pub fn snapshot(&self) -> CheckoutResult<CartSnapshot> {
        self.with_state(|s| {
            let totals = s.totals()?;
            Ok(CartSnapshot {
                items: s.cart.items().to_vec(),
                currency: s.currency.clone(),
                address: s.address.clone(),
                discount: s.discount.clone(),
                language: s.language.clone(),
                formatted: totals.format(&s.currency)?,
                totals,
                undeliverable_reason: s.undeliverable_reason(),
                revision: s.revision,
            })
        })
    }

    pub fn checkout_context(&self) -> CheckoutResult<CheckoutContext> {
        self.with_state(|s| {
            Ok(CheckoutContext {
                cart: s.cart.clone(),
                currency: s.currency.clone(),
                address: s.address.clone(),
                discount: s.discount.clone(),
                totals: s.totals()?,
                undeliverable_reason: s.undeliverable_reason(),
                revision: s.revision,
            })
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

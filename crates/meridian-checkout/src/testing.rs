//! In-memory backend and card network for unit tests.
//!
//! Every endpoint counts its calls, can be made to fail, and can be held
//! open until the test releases it.

use async_trait::async_trait;
use meridian_core::{
    fallback_currencies, fallback_languages, CartLineItem, CurrencyOption, DestinationKey,
    DiscountCode, DiscountKind, LanguageOption, Money, ProductSnapshot, ShippingDestination,
    ShippingRate, TaxRate, VariantSelection,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::backend::{
    CardConfirmation, CardHandle, CardNetwork, CheckoutBackend, ConfirmationStatus,
    DiscountRequest, DiscountResponse, PaymentIntent, PaymentIntentRequest, StockCheckRequest,
    StockCheckResponse, StockCheckResult,
};
use crate::error::{BackendError, BackendResult};
use crate::lock;
use crate::store::CartStore;

// =============================================================================
// Fixtures
// =============================================================================

pub fn product(id: &str, price: Decimal) -> ProductSnapshot {
    ProductSnapshot {
        product_id: id.to_string(),
        name: id.to_string(),
        price_base: Money::new(price, "USD".into()),
        compare_at_price_base: None,
    }
}

/// A USD-priced line in size M, color Black.
pub fn line(id: &str, name: &str, price: Decimal, quantity: i64) -> CartLineItem {
    let product = ProductSnapshot {
        name: name.to_string(),
        ..product(id, price)
    };
    CartLineItem::from_product(&product, quantity, VariantSelection::new("M", "Black"))
}

pub fn destination(country: &str, state: Option<&str>) -> ShippingDestination {
    ShippingDestination {
        address_id: "addr-1".to_string(),
        recipient_name: "Ada Lovelace".to_string(),
        line1: "12 Analytical Way".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: state.map(str::to_string),
        postal_code: "90210".to_string(),
        country: country.to_string(),
    }
}

/// A USD store on top of `backend`.
pub fn store_with(backend: FakeBackend) -> (Arc<FakeBackend>, CartStore) {
    let backend = Arc::new(backend);
    let usd = fallback_currencies().remove(0);
    let store = CartStore::new(backend.clone(), "USD".into(), usd);
    (backend, store)
}

fn shipping_rate(cost: Decimal, is_active: bool) -> ShippingRate {
    ShippingRate {
        country_code: "US".to_string(),
        state_code: None,
        shipping_cost_base: cost,
        is_active,
    }
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, Default)]
struct FakeState {
    currencies: Vec<CurrencyOption>,
    languages: Vec<LanguageOption>,
    shipping_rates: Vec<ShippingRate>,
    tax_percent: Option<Decimal>,
    stock_results: Option<Vec<StockCheckResult>>,

    calls: HashMap<&'static str, usize>,
    failing: HashSet<&'static str>,
    gates: HashMap<&'static str, Arc<Semaphore>>,
    last_discount_request: Option<DiscountRequest>,
    last_intent_request: Option<PaymentIntentRequest>,
}

/// Serves USD and EUR, ships anywhere for 5.99 with 8% tax, and knows
/// three discount codes: `SAVE5`, `TENOFF` and the expired `OLDCODE`.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn deliverable() -> Self {
        let backend = FakeBackend::default();
        {
            let mut state = lock(&backend.state);
            state.currencies = fallback_currencies().into_iter().take(2).collect();
            state.languages = fallback_languages();
            state.shipping_rates = vec![shipping_rate(dec!(5.99), true)];
            state.tax_percent = Some(dec!(8));
        }
        backend
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        lock(&self.state).calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn fail(&self, endpoint: &'static str) {
        lock(&self.state).failing.insert(endpoint);
    }

    pub fn recover(&self, endpoint: &'static str) {
        lock(&self.state).failing.remove(endpoint);
    }

    /// Calls to `endpoint` wait until [`release`](Self::release).
    pub fn hold(&self, endpoint: &'static str) {
        lock(&self.state)
            .gates
            .insert(endpoint, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, endpoint: &'static str) {
        if let Some(gate) = lock(&self.state).gates.remove(endpoint) {
            gate.close();
        }
    }

    pub fn push_currency(&self, option: CurrencyOption) {
        lock(&self.state).currencies.push(option);
    }

    pub fn set_shipping_rates(&self, rates: Vec<ShippingRate>) {
        lock(&self.state).shipping_rates = rates;
    }

    pub fn push_shipping_rate(&self, cost: Decimal, is_active: bool) {
        lock(&self.state)
            .shipping_rates
            .push(shipping_rate(cost, is_active));
    }

    pub fn set_tax_rate(&self, percent: Option<Decimal>) {
        lock(&self.state).tax_percent = percent;
    }

    pub fn set_stock_results(&self, results: Vec<StockCheckResult>) {
        lock(&self.state).stock_results = Some(results);
    }

    pub fn last_discount_request(&self) -> Option<DiscountRequest> {
        lock(&self.state).last_discount_request.clone()
    }

    pub fn last_intent_request(&self) -> Option<PaymentIntentRequest> {
        lock(&self.state).last_intent_request.clone()
    }

    /// Counts the call, waits out any hold, then applies a configured failure.
    async fn enter(&self, endpoint: &'static str) -> BackendResult<()> {
        let gate = {
            let mut state = lock(&self.state);
            *state.calls.entry(endpoint).or_insert(0) += 1;
            state.gates.get(endpoint).cloned()
        };
        if let Some(gate) = gate {
            // Closed on release
            let _ = gate.acquire().await;
        }
        if lock(&self.state).failing.contains(endpoint) {
            return Err(BackendError::Transport(format!("{} unreachable", endpoint)));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckoutBackend for FakeBackend {
    async fn currencies(&self) -> BackendResult<Vec<CurrencyOption>> {
        self.enter("currencies").await?;
        Ok(lock(&self.state).currencies.clone())
    }

    async fn languages(&self) -> BackendResult<Vec<LanguageOption>> {
        self.enter("languages").await?;
        Ok(lock(&self.state).languages.clone())
    }

    async fn shipping_rates(&self, _destination: &DestinationKey) -> BackendResult<Vec<ShippingRate>> {
        self.enter("shipping-rates").await?;
        Ok(lock(&self.state).shipping_rates.clone())
    }

    async fn tax_rate(&self, destination: &DestinationKey) -> BackendResult<Option<TaxRate>> {
        self.enter("tax-rate").await?;
        Ok(lock(&self.state).tax_percent.map(|rate_percent| TaxRate {
            country_code: destination.country.clone(),
            state_code: destination.state.clone(),
            rate_percent,
        }))
    }

    async fn validate_discount(&self, request: &DiscountRequest) -> BackendResult<DiscountResponse> {
        lock(&self.state).last_discount_request = Some(request.clone());
        self.enter("discounts/validate").await?;

        let accepted = |kind, value: Decimal, amount: Decimal| DiscountResponse {
            is_valid: true,
            discount: Some(DiscountCode {
                code: request.code.clone(),
                kind,
                value,
                min_amount_base: None,
                max_discount_base: None,
                calculated_amount_base: None,
            }),
            discount_amount: Some(amount),
            message: None,
            reason: None,
        };
        let rejected = |reason: &str, message: &str| DiscountResponse {
            is_valid: false,
            discount: None,
            discount_amount: None,
            message: Some(message.to_string()),
            reason: Some(reason.to_string()),
        };

        Ok(match request.code.as_str() {
            "SAVE5" => accepted(DiscountKind::Fixed, dec!(5), dec!(5).min(request.subtotal_base)),
            "TENOFF" => accepted(
                DiscountKind::Percentage,
                dec!(10),
                request.subtotal_base * dec!(10) / dec!(100),
            ),
            "OLDCODE" => rejected("EXPIRED", "This code expired on 2024-01-01"),
            _ => rejected("NOT_FOUND", "Invalid discount code"),
        })
    }

    async fn check_stock(&self, request: &StockCheckRequest) -> BackendResult<StockCheckResponse> {
        self.enter("stock/check").await?;
        let results = lock(&self.state).stock_results.clone().unwrap_or_else(|| {
            request
                .items
                .iter()
                .map(|_| StockCheckResult {
                    available: true,
                    current_stock: 100,
                    is_low_stock: false,
                    error: None,
                })
                .collect()
        });
        Ok(StockCheckResponse {
            all_available: results.iter().all(|r| r.available),
            results,
        })
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> BackendResult<PaymentIntent> {
        lock(&self.state).last_intent_request = Some(request.clone());
        self.enter("payments/create-intent").await?;
        Ok(PaymentIntent {
            client_secret: "pi_secret_1".to_string(),
            order_details: request.order_details.clone(),
        })
    }
}

// =============================================================================
// Card Network
// =============================================================================

#[derive(Debug)]
pub struct FakeCardNetwork {
    status: ConfirmationStatus,
    message: Option<String>,
    reference: Option<String>,
    confirm_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeCardNetwork {
    pub fn succeeding() -> Self {
        Self::with_status(ConfirmationStatus::Succeeded, None)
    }

    pub fn with_status(status: ConfirmationStatus, message: Option<&str>) -> Self {
        FakeCardNetwork {
            status,
            message: message.map(str::to_string),
            reference: Some("pi_ref_1".to_string()),
            confirm_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Succeeds without handing back a network reference.
    pub fn without_reference() -> Self {
        FakeCardNetwork {
            reference: None,
            ..Self::succeeding()
        }
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn hold(&self) {
        *lock(&self.gate) = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.close();
        }
    }
}

#[async_trait]
impl CardNetwork for FakeCardNetwork {
    async fn confirm(&self, _client_secret: &str, _card: &CardHandle) -> BackendResult<CardConfirmation> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        Ok(CardConfirmation {
            status: self.status,
            reference: self.reference.clone(),
            message: self.message.clone(),
        })
    }
}

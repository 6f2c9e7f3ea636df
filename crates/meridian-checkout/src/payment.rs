//! # Payment Orchestrator
//!
//! Drives one payment attempt for an already-computed total.
//!
//! ## Attempt State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──pay()──► Creating ──intent──► AwaitingConfirmation             │
//! │                      │                        │                         │
//! │          transport   │                        │ card network            │
//! │          error       ▼                        ▼                         │
//! │                   Failed          ┌───────────┼────────────┐            │
//! │                                   ▼           ▼            ▼            │
//! │                              Succeeded  RequiresAction   Failed         │
//! │                            (cart cleared) (cart kept)  (cart kept,      │
//! │                                                         retry allowed)  │
//! │                                                                         │
//! │  supersede() bumps the generation: an attempt already confirming is    │
//! │  left to finish but reports Superseded and has no effect.              │
//! │                                                                         │
//! │  If the store revision moves after the stock gate, the attempt stops   │
//! │  before the card is submitted.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order details sent with the intent are staged while the attempt is
//! in flight and discarded whatever the outcome.

use meridian_core::{convert, Cart, CoreResult, CurrencyOption, OrderTotals};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{
    CardHandle, CardNetwork, CheckoutBackend, ConfirmationStatus, OrderDetails, OrderLine,
    PaymentIntentRequest,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::lock;

/// Shown when the gateway cannot be reached.
pub const GENERIC_PAYMENT_FAILURE: &str =
    "We could not process your payment. Please try again.";

// =============================================================================
// Attempt
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentState {
    Idle,
    Creating,
    AwaitingConfirmation,
    Succeeded,
    RequiresAction,
    Failed,
}

impl PaymentState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, PaymentState::Creating | PaymentState::AwaitingConfirmation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub state: PaymentState,
    pub amount_minor_units: i64,
    #[serde(skip)]
    generation: u64,
}

/// How an attempt ended, as far as the checkout is concerned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PaymentOutcome {
    Succeeded {
        reference: String,
        order_details: OrderDetails,
    },
    /// Extra verification needed (3-D Secure and similar). Not a failure.
    RequiresAction { reference: Option<String> },
    /// Gateway message verbatim, or a generic one for transport failures.
    Failed { message: String },
    /// The attempt outlived the orchestrator's interest in it.
    Superseded,
}

/// Everything one attempt needs.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub totals: OrderTotals,
    pub currency: CurrencyOption,
    pub order_details: OrderDetails,
    pub customer_name: String,
    pub shipping_address_id: String,
    pub card: CardHandle,
}

/// Builds the order snapshot sent with the intent, in the display currency.
pub fn build_order_details(
    cart: &Cart,
    totals: &OrderTotals,
    currency: &CurrencyOption,
    discount_code: Option<&str>,
) -> CoreResult<OrderDetails> {
    let rate = currency.exchange_rate(cart.base_currency())?;
    let items = cart
        .items()
        .iter()
        .map(|item| {
            Ok(OrderLine {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                size: item.variant.size.clone(),
                color: item.variant.color.clone(),
                quantity: item.quantity,
                unit_price: convert(&item.unit_price_base, &rate)?.amount(),
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(OrderDetails {
        items,
        currency: currency.code.clone(),
        subtotal: totals.subtotal.amount(),
        shipping_cost: totals.shipping_cost.amount(),
        tax_amount: totals.tax_amount.amount(),
        discount_amount: totals.discount_amount.amount(),
        total: totals.total.amount(),
        discount_code: discount_code.map(str::to_string),
    })
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct PaymentOrchestrator {
    backend: Arc<dyn CheckoutBackend>,
    card_network: Arc<dyn CardNetwork>,
    generation: AtomicU64,
    attempt: Mutex<Option<PaymentAttempt>>,
    staged_order: Mutex<Option<OrderDetails>>,
}

impl PaymentOrchestrator {
    pub fn new(backend: Arc<dyn CheckoutBackend>, card_network: Arc<dyn CardNetwork>) -> Self {
        PaymentOrchestrator {
            backend,
            card_network,
            generation: AtomicU64::new(0),
            attempt: Mutex::new(None),
            staged_order: Mutex::new(None),
        }
    }

    /// The latest attempt, if any.
    pub fn current_attempt(&self) -> Option<PaymentAttempt> {
        lock(&self.attempt).clone()
    }

    pub fn state(&self) -> PaymentState {
        lock(&self.attempt)
            .as_ref()
            .map_or(PaymentState::Idle, |a| a.state)
    }

    /// Order details of the attempt in flight.
    pub fn staged_order(&self) -> Option<OrderDetails> {
        lock(&self.staged_order).clone()
    }

    /// Stops caring about the current attempt. Its result will be reported
    /// as [`PaymentOutcome::Superseded`].
    pub fn supersede(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut attempt = lock(&self.attempt);
        if let Some(current) = attempt.as_ref().filter(|a| a.state.is_in_flight()) {
            info!(attempt_id = %current.id, "Payment attempt superseded");
        }
        *attempt = None;
        lock(&self.staged_order).take();
        debug!(generation, "Payment generation advanced");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn transition(&self, generation: u64, state: PaymentState) {
        let mut attempt = lock(&self.attempt);
        if let Some(current) = attempt.as_mut().filter(|a| a.generation == generation) {
            info!(attempt_id = %current.id, from = ?current.state, to = ?state, "Payment transition");
            current.state = state;
        }
    }

    /// Runs one attempt.
    ///
    /// `still_current` is asked before the intent is created and again
    /// before the card is submitted; `false` aborts with
    /// [`CheckoutError::StaleContext`].
    pub async fn pay(
        &self,
        request: PaymentRequest,
        still_current: &(dyn Fn() -> bool + Send + Sync),
    ) -> CheckoutResult<PaymentOutcome> {
        let amount_minor_units = request
            .totals
            .total
            .to_minor_units(request.currency.decimals)?;

        let (generation, attempt_id) = {
            let mut attempt = lock(&self.attempt);
            if attempt.as_ref().is_some_and(|a| a.state.is_in_flight()) {
                return Err(CheckoutError::PaymentInProgress);
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let id = Uuid::new_v4();
            info!(
                attempt_id = %id,
                amount_minor_units,
                currency = %request.currency.code,
                "Creating payment intent"
            );
            *attempt = Some(PaymentAttempt {
                id,
                state: PaymentState::Creating,
                amount_minor_units,
                generation,
            });
            (generation, id)
        };

        if !still_current() {
            self.abandon(generation);
            return Err(CheckoutError::StaleContext(
                "order total changed before payment".to_string(),
            ));
        }

        *lock(&self.staged_order) = Some(request.order_details.clone());
        let outcome = self
            .create_and_confirm(generation, attempt_id, amount_minor_units, &request, still_current)
            .await;
        if self.is_current(generation) {
            lock(&self.staged_order).take();
        }
        outcome
    }

    async fn create_and_confirm(
        &self,
        generation: u64,
        attempt_id: Uuid,
        amount_minor_units: i64,
        request: &PaymentRequest,
        still_current: &(dyn Fn() -> bool + Send + Sync),
    ) -> CheckoutResult<PaymentOutcome> {
        let intent_request = PaymentIntentRequest {
            amount_minor_units,
            currency: request.currency.code.clone(),
            order_details: request.order_details.clone(),
            customer_name: request.customer_name.clone(),
            shipping_address_id: request.shipping_address_id.clone(),
        };

        let intent = match self.backend.create_payment_intent(&intent_request).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "Payment intent creation failed");
                if !self.is_current(generation) {
                    return Ok(PaymentOutcome::Superseded);
                }
                self.transition(generation, PaymentState::Failed);
                return Ok(PaymentOutcome::Failed {
                    message: GENERIC_PAYMENT_FAILURE.to_string(),
                });
            }
        };

        if !self.is_current(generation) {
            return Ok(PaymentOutcome::Superseded);
        }
        if !still_current() {
            self.abandon(generation);
            return Err(CheckoutError::StaleContext(
                "order total changed before card confirmation".to_string(),
            ));
        }

        self.transition(generation, PaymentState::AwaitingConfirmation);
        let confirmation = self
            .card_network
            .confirm(&intent.client_secret, &request.card)
            .await;

        if !self.is_current(generation) {
            info!("Ignoring result of superseded payment attempt");
            return Ok(PaymentOutcome::Superseded);
        }

        let outcome = match confirmation {
            Ok(confirmation) => match confirmation.status {
                ConfirmationStatus::Succeeded => {
                    self.transition(generation, PaymentState::Succeeded);
                    let reference = confirmation
                        .reference
                        .unwrap_or_else(|| attempt_id.to_string());
                    PaymentOutcome::Succeeded {
                        reference,
                        order_details: intent.order_details,
                    }
                }
                ConfirmationStatus::RequiresAction => {
                    self.transition(generation, PaymentState::RequiresAction);
                    PaymentOutcome::RequiresAction {
                        reference: confirmation.reference,
                    }
                }
                ConfirmationStatus::Failed => {
                    self.transition(generation, PaymentState::Failed);
                    PaymentOutcome::Failed {
                        message: confirmation
                            .message
                            .unwrap_or_else(|| "Your payment was declined.".to_string()),
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "Card confirmation failed");
                self.transition(generation, PaymentState::Failed);
                PaymentOutcome::Failed {
                    message: GENERIC_PAYMENT_FAILURE.to_string(),
                }
            }
        };

        Ok(outcome)
    }

    fn abandon(&self, generation: u64) {
        let mut attempt = lock(&self.attempt);
        if attempt.as_ref().is_some_and(|a| a.generation == generation) {
            info!("Payment attempt abandoned, order total changed");
            *attempt = None;
        }
        lock(&self.staged_order).take();
    }
}

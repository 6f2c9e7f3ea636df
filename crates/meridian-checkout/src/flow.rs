//! # Checkout Flow
//!
//! Ties the store, the stock gate and the payment orchestrator into the one
//! operation the "Pay" button triggers.
//!
//! ```text
//! checkout(request)
//!   │
//!   ├── 1. snapshot store at revision R   (cart, currency, address, totals)
//!   ├── 2. empty cart?                    → EmptyCart
//!   ├── 3. no address / not deliverable?  → Validation / Undeliverable
//!   ├── 4. StockGate::ensure_available    → InsufficientStock (no intent)
//!   ├── 5. PaymentOrchestrator::pay       (aborts if revision ≠ R)
//!   └── 6. Succeeded?                     → clear cart
//! ```

use meridian_core::{OrderTotals, ValidationError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{CardHandle, CardNetwork, CheckoutBackend};
use crate::error::{CheckoutError, CheckoutResult};
use crate::payment::{build_order_details, PaymentOrchestrator, PaymentOutcome, PaymentRequest};
use crate::stock::StockGate;
use crate::store::CartStore;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Name on the order. Blank falls back to the address recipient.
    pub customer_name: String,
    pub card: CardHandle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub outcome: PaymentOutcome,
    /// Low-stock notices from the gate.
    pub stock_warnings: Vec<String>,
    /// The totals the shopper agreed to.
    pub totals: OrderTotals,
}

pub struct CheckoutFlow {
    store: Arc<CartStore>,
    stock: StockGate,
    payments: PaymentOrchestrator,
}

impl CheckoutFlow {
    pub fn new(
        store: Arc<CartStore>,
        backend: Arc<dyn CheckoutBackend>,
        card_network: Arc<dyn CardNetwork>,
    ) -> Self {
        CheckoutFlow {
            store,
            stock: StockGate::new(backend.clone()),
            payments: PaymentOrchestrator::new(backend, card_network),
        }
    }

    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    pub fn payments(&self) -> &PaymentOrchestrator {
        &self.payments
    }

    /// Abandons the attempt in flight, e.g. when the shopper leaves checkout.
    pub fn supersede(&self) {
        self.payments.supersede();
    }

    pub async fn checkout(&self, request: CheckoutRequest) -> CheckoutResult<CheckoutReceipt> {
        let ctx = self.store.checkout_context()?;

        if ctx.cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let address = ctx.address.as_ref().ok_or_else(|| ValidationError::Required {
            field: "shipping address".to_string(),
        })?;
        if !ctx.totals.is_deliverable {
            let destination = address.rate_key().to_string();
            warn!(%destination, reason = ?ctx.undeliverable_reason, "Checkout blocked, destination not deliverable");
            return Err(CheckoutError::Undeliverable { destination });
        }

        let stock = self.stock.ensure_available(ctx.cart.items()).await?;

        let order_details = build_order_details(
            &ctx.cart,
            &ctx.totals,
            &ctx.currency,
            ctx.discount.as_ref().map(|d| d.code.as_str()),
        )?;
        let customer_name = match request.customer_name.trim() {
            "" => address.recipient_name.clone(),
            name => name.to_string(),
        };

        let revision = ctx.revision;
        let still_current = || self.store.revision() == revision;
        let outcome = self
            .payments
            .pay(
                PaymentRequest {
                    totals: ctx.totals.clone(),
                    currency: ctx.currency.clone(),
                    order_details,
                    customer_name,
                    shipping_address_id: address.address_id.clone(),
                    card: request.card,
                },
                &still_current,
            )
            .await?;

        if let PaymentOutcome::Succeeded { reference, .. } = &outcome {
            info!(%reference, "Order paid");
            self.store.clear();
        }

        Ok(CheckoutReceipt {
            outcome,
            stock_warnings: stock.warnings,
            totals: ctx.totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ConfirmationStatus, StockCheckResult};
    use crate::testing::{destination, product, store_with, FakeBackend, FakeCardNetwork};
    use meridian_core::VariantSelection;
    use rust_decimal_macros::dec;

    struct Harness {
        backend: Arc<FakeBackend>,
        card: Arc<FakeCardNetwork>,
        store: Arc<CartStore>,
        flow: Arc<CheckoutFlow>,
    }

    fn harness(backend: FakeBackend, card: FakeCardNetwork) -> Harness {
        let (backend, store) = store_with(backend);
        let store = Arc::new(store);
        let card = Arc::new(card);
        let flow = Arc::new(CheckoutFlow::new(store.clone(), backend.clone(), card.clone()));
        Harness {
            backend,
            card,
            store,
            flow,
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            customer_name: "Ada Lovelace".to_string(),
            card: CardHandle::new("tok_visa"),
        }
    }

    async fn filled(h: &Harness) {
        h.store
            .add_item(&product("tee", dec!(20)), 2, VariantSelection::new("M", "Black"))
            .unwrap();
        h.store
            .set_address(Some(destination("US", Some("CA"))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let h = harness(FakeBackend::deliverable(), FakeCardNetwork::succeeding());

        let err = h.flow.checkout(request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ValidationError::EmptyCart)));
        assert_eq!(h.backend.calls("stock/check"), 0);
    }

    #[tokio::test]
    async fn test_address_required() {
        let h = harness(FakeBackend::deliverable(), FakeCardNetwork::succeeding());
        h.store
            .add_item(&product("tee", dec!(20)), 1, VariantSelection::new("M", "Black"))
            .unwrap();

        let err = h.flow.checkout(request()).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::Required { .. })
        ));
    }

    #[tokio::test]
    async fn test_undeliverable_destination_named() {
        let backend = FakeBackend::deliverable();
        backend.set_tax_rate(None);
        let h = harness(backend, FakeCardNetwork::succeeding());
        filled(&h).await;

        let err = h.flow.checkout(request()).await.unwrap_err();
        match err {
            CheckoutError::Undeliverable { destination } => assert_eq!(destination, "US-CA"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.backend.calls("stock/check"), 0);
    }

    #[tokio::test]
    async fn test_stock_shortfall_blocks_payment() {
        let backend = FakeBackend::deliverable();
        backend.set_stock_results(vec![StockCheckResult {
            available: false,
            current_stock: 1,
            is_low_stock: true,
            error: None,
        }]);
        let h = harness(backend, FakeCardNetwork::succeeding());
        filled(&h).await;

        let err = h.flow.checkout(request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
        assert_eq!(h.backend.calls("payments/create-intent"), 0);
        assert_eq!(h.card.confirm_calls(), 0);
        assert_eq!(h.store.items().len(), 1);
    }

    #[tokio::test]
    async fn test_success_clears_cart() {
        let h = harness(FakeBackend::deliverable(), FakeCardNetwork::succeeding());
        filled(&h).await;
        h.store.apply_discount("SAVE5").await.unwrap();

        let receipt = h.flow.checkout(request()).await.unwrap();

        assert!(matches!(receipt.outcome, PaymentOutcome::Succeeded { .. }));
        // 40 - 5 + 5.99 + 8% of 35
        assert_eq!(receipt.totals.total.amount(), dec!(43.79));
        assert!(h.store.items().is_empty());
        assert_eq!(h.store.discount(), None);
        assert!(h.store.address().is_some());

        let sent = h.backend.last_intent_request().unwrap();
        assert_eq!(sent.amount_minor_units, 4379);
        assert_eq!(sent.order_details.discount_code.as_deref(), Some("SAVE5"));
        assert_eq!(sent.shipping_address_id, "addr-1");
    }

    #[tokio::test]
    async fn test_decline_keeps_cart() {
        let h = harness(
            FakeBackend::deliverable(),
            FakeCardNetwork::with_status(ConfirmationStatus::Failed, Some("Card declined")),
        );
        filled(&h).await;

        let receipt = h.flow.checkout(request()).await.unwrap();

        assert_eq!(
            receipt.outcome,
            PaymentOutcome::Failed {
                message: "Card declined".to_string()
            }
        );
        assert_eq!(h.store.items().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_customer_name_uses_recipient() {
        let h = harness(FakeBackend::deliverable(), FakeCardNetwork::succeeding());
        filled(&h).await;

        h.flow
            .checkout(CheckoutRequest {
                customer_name: "  ".to_string(),
                card: CardHandle::new("tok_visa"),
            })
            .await
            .unwrap();

        assert_eq!(
            h.backend.last_intent_request().unwrap().customer_name,
            "Ada Lovelace"
        );
    }

    #[tokio::test]
    async fn test_cart_change_during_payment_aborts() {
        let backend = FakeBackend::deliverable();
        backend.hold("payments/create-intent");
        let h = harness(backend, FakeCardNetwork::succeeding());
        filled(&h).await;

        let task = tokio::spawn({
            let flow = h.flow.clone();
            async move { flow.checkout(request()).await }
        });
        while h.backend.calls("payments/create-intent") == 0 {
            tokio::task::yield_now().await;
        }

        h.store
            .add_item(&product("cap", dec!(10)), 1, VariantSelection::new("M", "Black"))
            .unwrap();
        h.backend.release("payments/create-intent");

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, CheckoutError::StaleContext(_)));
        assert_eq!(h.card.confirm_calls(), 0);
        assert_eq!(h.store.items().len(), 2);
    }
}
